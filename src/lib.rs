// src/lib.rs
//! crab-cage-kv 库：protocol / engine / persistence / expire / replication / server / monitor

pub mod cli;         // 命令行参数
pub mod config;      // JSON 配置
pub mod engine;      // 存储引擎（db + 热缓存 LRU + TTL）
pub mod error;       // 引擎错误类型
pub mod expire;      // 过期清理任务
pub mod housekeeper; // 后台任务管理
pub mod monitor;     // 监控
pub mod node;        // leader / follower 装配
pub mod persistence; // AOF 追加、重放、压缩
pub mod protocol;    // 文本协议解析
pub mod replication; // 主从复制
pub mod server;      // 网络层 & 命令分发
