// src/monitor/metrics.rs

use super::*;
use crate::engine::Info;

#[derive(Debug, Default)]
pub struct Metrics {
    pub connected_clients: AtomicU64,
    pub total_connections: AtomicU64,
    pub connected_followers: AtomicU64,
    pub replicated_commands: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics::default()
    }

    pub fn client_connected(&self) {
        self.connected_clients.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn client_disconnected(&self) {
        self.connected_clients.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn follower_connected(&self) {
        self.connected_followers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn follower_disconnected(&self) {
        self.connected_followers.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_replicated(&self) {
        self.replicated_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn replicated_commands(&self) -> u64 {
        self.replicated_commands.load(Ordering::Relaxed)
    }

    /// Prometheus 文本格式：连接计数 + 引擎统计
    pub fn to_prometheus(&self, info: &Info, aof_size: u64) -> String {
        let mut output = String::new();

        let counters: [(&str, &str, &str, u64); 10] = [
            ("connected_clients", "gauge", "Current number of client connections",
                self.connected_clients.load(Ordering::Relaxed)),
            ("total_connections", "counter", "Total connections since startup",
                self.total_connections.load(Ordering::Relaxed)),
            ("connected_followers", "gauge", "Followers currently receiving the command stream",
                self.connected_followers.load(Ordering::Relaxed)),
            ("replicated_commands", "counter", "Commands pushed to followers",
                self.replicated_commands.load(Ordering::Relaxed)),
            ("keys_in_db", "gauge", "Keys in the full dataset", info.keys_in_db as u64),
            ("keys_in_hot_cache", "gauge", "Keys in the LRU hot cache", info.keys_in_hot_cache as u64),
            ("cache_hits", "counter", "GETs served from the hot cache", info.hits),
            ("cache_misses", "counter", "GETs promoted from the dataset", info.misses),
            ("total_commands", "counter", "Engine commands processed", info.total_commands),
            ("aof_size_bytes", "gauge", "Current size of the append-only file", aof_size),
        ];

        for (name, kind, help, value) in counters {
            output.push_str(&format!("# HELP crab_cage_{} {}\n", name, help));
            output.push_str(&format!("# TYPE crab_cage_{} {}\n", name, kind));
            output.push_str(&format!("crab_cage_{} {}\n", name, value));
        }

        output
    }
}
