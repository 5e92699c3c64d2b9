// src/housekeeper.rs
//! 每个引擎实例配套的后台任务：TTL 清理 + AOF 压缩。
//! 关闭时先发信号，再等两个任务都退出。

use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{info, warn};

use crate::{engine::Engine, expire, persistence};

pub struct Housekeeper {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Housekeeper {
    pub fn start(engine: Arc<Engine>, sweep_every: Duration, compact_every: Duration) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(expire::start_cleaner(engine.clone(), sweep_every, rx.clone())),
            tokio::spawn(persistence::start_compactor(engine, compact_every, rx)),
        ];
        info!(?sweep_every, ?compact_every, "housekeeper started");
        Housekeeper { shutdown, tasks }
    }

    /// 通知后台任务退出并等待它们结束
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = ?e, "background task ended abnormally");
            }
        }
    }
}
