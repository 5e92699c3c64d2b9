// src/monitor/mod.rs
//! 监控：连接 / 复制计数，以及可选的 HTTP `/metrics` 端点
mod metrics;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;
use warp::Filter;

pub use metrics::Metrics;

use crate::engine::Engine;

/// 在 `port` 上提供 Prometheus 文本，收到关闭信号后优雅退出
pub async fn serve_metrics(
    engine: Arc<Engine>,
    metrics: Arc<Metrics>,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let route = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(move || {
            let engine = engine.clone();
            let metrics = metrics.clone();
            async move {
                let info = engine.info().await;
                let body = metrics.to_prometheus(&info, engine.aof_size().await);
                Ok::<_, Infallible>(warp::reply::with_header(
                    body,
                    "content-type",
                    "text/plain; version=0.0.4",
                ))
            }
        });

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let (bound, server) = warp::serve(route).try_bind_with_graceful_shutdown(addr, async move {
        while shutdown.changed().await.is_ok() {
            if *shutdown.borrow() {
                break;
            }
        }
    })?;
    info!(addr = %bound, "metrics endpoint listening");
    server.await;
    Ok(())
}
