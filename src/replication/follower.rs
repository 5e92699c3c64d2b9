// src/replication/follower.rs
//! follower 侧：连接 leader、握手，然后把命令流应用到本地引擎。
//! 本地引擎有自己的 AOF、自己的 TTL 清理和压缩任务；复制命令不回复 leader。

use anyhow::{Context, Result, bail};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    sync::watch,
};
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::protocol::{ACK_REPLICATION, Command, REPLICATE};

/// 应用一条复制过来的命令；只接受 SET / DEL / INCR，返回是否被应用
pub async fn apply_replicated(engine: &Engine, line: &str) -> bool {
    match Command::parse(line) {
        Some(Command::Set { key, value, ttl }) => {
            engine.set(&key, &value, ttl).await;
            debug!(key = %key, "synced SET");
            true
        }
        Some(Command::Del { key }) => {
            engine.delete(&key).await;
            debug!(key = %key, "synced DEL");
            true
        }
        Some(Command::Incr { key }) => {
            if let Err(e) = engine.increment(&key).await {
                warn!(key = %key, error = %e, "replicated INCR failed locally");
            }
            debug!(key = %key, "synced INCR");
            true
        }
        _ => {
            warn!(line = %line, "ignoring non-replicable command");
            false
        }
    }
}

/// 跑一条复制链路直到 leader 断开或收到关闭信号
pub async fn run_follower(
    engine: &Engine,
    leader_addr: &str,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    info!(leader = %leader_addr, "connecting to leader");
    let stream = TcpStream::connect(leader_addr)
        .await
        .with_context(|| format!("Failed to connect to leader {}", leader_addr))?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    // 握手
    writer.write_all(format!("{}\n", REPLICATE).as_bytes()).await?;
    writer.flush().await?;
    let mut ack = String::new();
    reader.read_line(&mut ack).await?;
    if ack.trim() != ACK_REPLICATION {
        bail!("unexpected handshake reply from leader: {:?}", ack.trim());
    }
    info!("replication link established, mirroring leader data");

    let mut lines = reader.lines();
    loop {
        tokio::select! {
            next = lines.next_line() => {
                match next.context("Failed to read from leader")? {
                    Some(line) => {
                        if !line.trim().is_empty() {
                            apply_replicated(engine, &line).await;
                        }
                    }
                    None => {
                        info!("leader disconnected");
                        break;
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    Ok(())
}
