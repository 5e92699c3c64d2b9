// src/server.rs
//! 网络层：
//! - 监听 TCP 连接，每个连接一个任务
//! - 按行读取命令，解析后交给 engine 执行
//! - 写命令执行并落盘之后，把原始命令转发给所有 follower
//! - 回复 = 结果字符串 + '\n'
//! - 收到 REPLICATE 的连接转为 follower 链路，不再当普通客户端处理
use anyhow::Result;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::watch,
};
use tracing::{debug, info, warn};

use crate::engine::{self, Engine};
use crate::monitor::Metrics;
use crate::protocol::{Command, UNKNOWN_COMMAND};
use crate::replication::{Followers, serve_follower};

/// 所有连接任务共享的状态
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub followers: Arc<Followers>,
    pub metrics: Arc<Metrics>,
}

impl ServerState {
    pub fn new(engine: Arc<Engine>) -> Arc<Self> {
        Arc::new(ServerState {
            engine,
            followers: Arc::new(Followers::new()),
            metrics: Arc::new(Metrics::new()),
        })
    }
}

/// 接受循环：不断 accept 新连接并 spawn 出一个任务，直到收到关闭信号
pub async fn serve(
    listener: TcpListener,
    state: Arc<ServerState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    info!(addr = %listener.local_addr()?, "leader listening");
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => spawn_connection(stream, peer, &state),
                Err(e) => warn!(error = ?e, "failed to accept connection"),
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("listener shutting down");
                    break;
                }
            }
        }
    }
    Ok(())
}

fn spawn_connection(stream: TcpStream, peer: SocketAddr, state: &Arc<ServerState>) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        debug!(peer = %peer, "accepted connection");
        state.metrics.client_connected();
        let handoff = handle_connection(stream, peer, &state).await;
        // 转为 follower 的连接不再计入普通客户端
        state.metrics.client_disconnected();

        let res = match handoff {
            Ok(Some((reader, writer))) => {
                serve_follower(reader, writer, state.followers.clone(), state.metrics.clone()).await
            }
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(err) = res {
            warn!(peer = %peer, error = ?err, "connection closed with error");
        }
    });
}

/// 收到 REPLICATE 之后交给复制层的连接两端
type FollowerLink = (BufReader<OwnedReadHalf>, OwnedWriteHalf);

/// 单个连接的处理逻辑；连接发来 REPLICATE 时把两端交还给调用方
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: &ServerState,
) -> Result<Option<FollowerLink>> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!(peer = %peer, "disconnected");
                break;
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                debug!(peer = %peer, "connection reset");
                break;
            }
            Err(e) => return Err(e.into()),
        }

        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }

        let response = match Command::parse(raw) {
            Some(Command::Replicate) => {
                info!(peer = %peer, "replication handshake");
                return Ok(Some((reader, writer)));
            }
            Some(cmd) => {
                let reply = engine::execute(&state.engine, &cmd).await;
                if reply.replicate {
                    state.followers.broadcast(raw);
                }
                reply.text
            }
            None => UNKNOWN_COMMAND.to_string(),
        };

        writer.write_all(format!("{}\n", response).as_bytes()).await?;
    }

    Ok(None)
}
