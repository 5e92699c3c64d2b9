// src/cli.rs
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(author, version, about = "LRU-fronted key-value store with AOF and leader/follower replication", long_about = None)]
pub struct Cli {
    /// JSON 配置文件路径，不存在时写入默认配置
    #[arg(long, global = true, default_value = "config.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 以 leader 身份运行：接受客户端连接并向 follower 转发写命令
    Leader(LeaderArgs),
    /// 以 follower 身份运行：镜像 leader 的命令流
    Follower(FollowerArgs),
}

#[derive(Args, Debug, Clone)]
pub struct LeaderArgs {
    /// 覆盖配置中的监听地址
    #[arg(long)]
    pub bind: Option<String>,

    /// 覆盖配置中的热缓存容量
    #[arg(long)]
    pub capacity: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct FollowerArgs {
    /// 覆盖配置中的 leader 地址
    #[arg(long)]
    pub leader: Option<String>,

    #[arg(long)]
    pub capacity: Option<usize>,
}

impl LeaderArgs {
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(bind) = &self.bind {
            cfg.bind_addr = bind.clone();
        }
        if let Some(capacity) = self.capacity {
            cfg.capacity = capacity;
        }
    }
}

impl FollowerArgs {
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(leader) = &self.leader {
            cfg.leader_addr = leader.clone();
        }
        if let Some(capacity) = self.capacity {
            cfg.capacity = capacity;
        }
    }
}
