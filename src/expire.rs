// src/expire.rs
//! 过期策略：
//! - 惰性过期在 `Engine::get` 里完成
//! - 这里是后台定时清理任务，每个周期一次加锁清掉所有过期 key

use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, time};
use tracing::{info, warn};

use crate::engine::Engine;

/// 默认清理周期（秒）
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5;

/// 后台定时清理任务，收到关闭信号后退出
pub async fn start_cleaner(
    engine: Arc<Engine>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut iv = time::interval_at(time::Instant::now() + interval, interval);
    loop {
        tokio::select! {
            _ = iv.tick() => {
                for key in engine.sweep_expired().await {
                    info!(key = %key, "TTL expired");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    warn!("TTL cleaner stopped");
}
