// src/replication/mod.rs
//! 主从复制（尽力而为、异步、以 leader 为准）
//!
//! - leader：完成 `REPLICATE` 握手的连接登记到 [`Followers`]，每条写命令执行并落盘后原样转发
//! - follower：连上 leader，握手后把收到的命令流喂给自己的引擎

pub mod follower;
pub mod leader;

pub use follower::{apply_replicated, run_follower};
pub use leader::{Followers, serve_follower};
