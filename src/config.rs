use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use anyhow::{Context, Result};
use serde_json;
use tracing::info;

use crate::expire::DEFAULT_SWEEP_INTERVAL_SECS;

/// 进程启动后从 JSON 配置文件读到的全局配置
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// leader 监听地址
    pub bind_addr: String,
    /// 热缓存容量
    pub capacity: usize,
    /// leader 的 AOF 路径
    pub aof_path: PathBuf,
    /// follower 的 AOF 路径
    pub follower_aof_path: PathBuf,
    /// follower 要连接的 leader 地址
    pub leader_addr: String,
    /// TTL 后台清理周期（秒）
    pub sweep_interval_secs: u64,
    /// AOF 压缩周期（秒）
    pub compaction_interval_secs: u64,
    // 监控配置
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "127.0.0.1:8889".to_string(),
            capacity: 10,
            aof_path: PathBuf::from("persistence/appendonly.aof"),
            follower_aof_path: PathBuf::from("persistence/follower_appendonly.aof"),
            leader_addr: "127.0.0.1:8889".to_string(),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            compaction_interval_secs: 30,
            metrics_enabled: false,
            metrics_port: 9090,
        }
    }
}

/// 从指定路径读取并反序列化 JSON 配置
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();

    // 如果配置文件不存在，创建默认配置
    if !path_ref.exists() {
        info!(path = ?path_ref, "config file not found, creating default configuration");

        let default_cfg = Config::default();
        if let Some(dir) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let default_json = serde_json::to_string_pretty(&default_cfg)?;
        fs::write(path_ref, default_json)
            .with_context(|| format!("Failed to write default config {:?}", path_ref))?;

        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read config file {:?}", path_ref))?;
    let cfg: Config = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse {:?}", path_ref))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("conf").join("config.json");

        let cfg = load(&path)?;
        assert_eq!(cfg, Config::default());
        assert!(path.exists(), "默认配置应写回磁盘");
        assert_eq!(load(&path)?, cfg);
        Ok(())
    }

    #[test]
    fn test_partial_config_uses_defaults() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{ "capacity": 3, "metrics_enabled": true }"#)?;

        let cfg = load(&path)?;
        assert_eq!(cfg.capacity, 3);
        assert!(cfg.metrics_enabled);
        assert_eq!(cfg.sweep_interval_secs, 5);
        assert_eq!(cfg.compaction_interval_secs, 30);
        Ok(())
    }

    #[test]
    fn test_bad_json_is_an_error() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ not json")?;
        assert!(load(&path).is_err());
        Ok(())
    }
}
