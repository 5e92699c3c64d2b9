// src/node.rs
//! 进程级装配：leader / follower 各自拥有一个引擎实例、一份 AOF 和一组后台任务，
//! 两者之间不共享任何状态。

use anyhow::{Context, Result};
use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::watch, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    config::Config,
    engine::Engine,
    housekeeper::Housekeeper,
    monitor,
    replication,
    server::{self, ServerState},
};

fn housekeeper_for(engine: &Arc<Engine>, cfg: &Config) -> Housekeeper {
    Housekeeper::start(
        engine.clone(),
        Duration::from_secs(cfg.sweep_interval_secs.max(1)),
        Duration::from_secs(cfg.compaction_interval_secs.max(1)),
    )
}

pub struct Leader {
    state: Arc<ServerState>,
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<Result<()>>,
    metrics: Option<JoinHandle<Result<()>>>,
    housekeeper: Housekeeper,
}

impl Leader {
    /// 重放 AOF、启动后台任务、绑定监听地址
    pub async fn start(cfg: &Config) -> Result<Self> {
        let engine = Engine::open(cfg.capacity, &cfg.aof_path)?;
        let listener = TcpListener::bind(&cfg.bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", cfg.bind_addr))?;
        let local_addr = listener.local_addr()?;

        let housekeeper = housekeeper_for(&engine, cfg);
        let state = ServerState::new(engine.clone());
        let (shutdown, rx) = watch::channel(false);

        let metrics = cfg.metrics_enabled.then(|| {
            tokio::spawn(monitor::serve_metrics(
                engine.clone(),
                state.metrics.clone(),
                cfg.metrics_port,
                rx.clone(),
            ))
        });
        let server = tokio::spawn(server::serve(listener, state.clone(), rx));

        info!(addr = %local_addr, capacity = cfg.capacity, "leader active");
        Ok(Leader { state, local_addr, shutdown, server, metrics, housekeeper })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.state.engine
    }

    pub fn followers(&self) -> usize {
        self.state.followers.len()
    }

    pub fn metrics(&self) -> &Arc<monitor::Metrics> {
        &self.state.metrics
    }

    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        signal.await;
        self.shutdown().await
    }

    /// 停止监听，取消后台任务并等待它们结束；进行中的客户端命令不保证完成
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.server.await.context("listener task panicked")??;
        if let Some(metrics) = self.metrics {
            if let Err(e) = metrics.await.context("metrics task panicked")? {
                warn!(error = ?e, "metrics endpoint exited with error");
            }
        }
        self.housekeeper.shutdown().await;
        info!("leader stopped");
        Ok(())
    }
}

pub struct Follower {
    engine: Arc<Engine>,
    shutdown: watch::Sender<bool>,
    link: JoinHandle<Result<()>>,
    housekeeper: Housekeeper,
}

impl Follower {
    /// 打开 follower 自己的 AOF，启动后台任务，然后连接 leader
    pub async fn start(cfg: &Config) -> Result<Self> {
        let engine = Engine::open(cfg.capacity, &cfg.follower_aof_path)?;
        let housekeeper = housekeeper_for(&engine, cfg);
        let (shutdown, rx) = watch::channel(false);

        let link_engine = engine.clone();
        let leader_addr = cfg.leader_addr.clone();
        let link = tokio::spawn(async move {
            replication::run_follower(&link_engine, &leader_addr, rx).await
        });

        Ok(Follower { engine, shutdown, link, housekeeper })
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// 运行到 leader 断开或收到外部信号为止
    pub async fn run_until<F>(mut self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(signal);
        let link_result = tokio::select! {
            _ = &mut signal => None,
            res = &mut self.link => Some(res),
        };

        let _ = self.shutdown.send(true);
        let res = match link_result {
            Some(res) => res.context("replication task panicked")?,
            None => self.link.await.context("replication task panicked")?,
        };
        self.housekeeper.shutdown().await;
        info!("follower stopped");
        res
    }

    pub async fn shutdown(self) -> Result<()> {
        self.run_until(async {}).await
    }
}
