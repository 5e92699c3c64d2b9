// src/replication/leader.rs
//! leader 侧：follower 登记表 + 每个 follower 一个推送任务。
//!
//! 每个 follower 有自己的无界发送队列，广播只是往队列里塞消息，
//! 某个 follower 卡住不会拖慢其它 follower。写失败的 follower 从登记表中移除且只移除一次，
//! 不重试、不补发。

use anyhow::Result;
use dashmap::DashMap;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tracing::{debug, info, warn};

use crate::monitor::Metrics;
use crate::protocol::ACK_REPLICATION;

pub type FollowerId = u64;

#[derive(Debug, Default)]
pub struct Followers {
    links: DashMap<FollowerId, mpsc::UnboundedSender<Arc<str>>>,
    next_id: AtomicU64,
}

impl Followers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个新 follower，返回它的 id 和待推送命令的接收端
    pub fn register(&self) -> (FollowerId, mpsc::UnboundedReceiver<Arc<str>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.links.insert(id, tx);
        (id, rx)
    }

    /// 返回 true 表示这次调用真正移除了它
    pub fn remove(&self, id: FollowerId) -> bool {
        self.links.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// 把命令原文转发给所有 follower，返回成功入队的数量
    pub fn broadcast(&self, command: &str) -> usize {
        if self.links.is_empty() {
            return 0;
        }
        let msg: Arc<str> = Arc::from(command);
        let mut dead = Vec::new();
        let mut sent = 0;
        for link in self.links.iter() {
            match link.value().send(msg.clone()) {
                Ok(()) => sent += 1,
                Err(_) => dead.push(*link.key()),
            }
        }
        // 遍历结束再删，避免持有分片锁时写 DashMap
        for id in dead {
            if self.remove(id) {
                info!(follower = id, "follower disconnected");
            }
        }
        sent
    }
}

/// 已完成握手的连接：先登记再回 ACK，这样 ACK 之后的写命令都不会漏掉；
/// 之后只往对端推送命令，对端断开或写失败时退出并注销。
pub async fn serve_follower<R, W>(
    mut reader: R,
    mut writer: W,
    followers: Arc<Followers>,
    metrics: Arc<Metrics>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (id, mut rx) = followers.register();
    metrics.follower_connected();
    info!(follower = id, "node is now a follower");

    let res = push_loop(&mut reader, &mut writer, &mut rx, &metrics).await;

    if followers.remove(id) {
        info!(follower = id, "follower disconnected");
    }
    metrics.follower_disconnected();
    res
}

async fn push_loop<R, W>(
    reader: &mut R,
    writer: &mut W,
    rx: &mut mpsc::UnboundedReceiver<Arc<str>>,
    metrics: &Metrics,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(format!("{}\n", ACK_REPLICATION).as_bytes()).await?;
    writer.flush().await?;

    // follower 不会回复复制命令，读端只用来发现断开
    let mut scratch = [0u8; 256];
    loop {
        tokio::select! {
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                if let Err(e) = write_line(writer, &msg).await {
                    warn!(error = %e, "replication send failed");
                    break;
                }
                metrics.record_replicated();
                debug!(command = %msg, "replicated");
            }
            read = reader.read(&mut scratch) => {
                match read {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        }
    }
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
