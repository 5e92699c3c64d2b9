// src/persistence.rs
//! AOF 持久化：
//! - 每条写命令追加一行，返回前落盘
//! - 启动时同步读出全部记录用于重放
//! - 压缩（rewrite）：写临时文件后原子替换，失败时原日志保持不动

use anyhow::{Context, Result};
use std::{
    fs,
    io::{BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::watch, time};
use tracing::{error, info, warn};

use crate::engine::Engine;
use crate::error::KvResult;

/// 追加写日志
#[derive(Debug)]
pub struct AofLog {
    path: PathBuf,
    // 懒打开；压缩替换文件后置空，下次追加重新打开新文件
    file: Option<tokio::fs::File>,
}

impl AofLog {
    /// 指定 AOF 路径，父目录不存在时自动创建
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = parent_dir(&path) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create persistence dir {:?}", dir))?;
        }
        Ok(AofLog { path, file: None })
    }

    /// 当前日志大小（字节），文件不存在时为 0
    pub fn size(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// 追加一条记录，flush + fsync 之后才返回
    pub async fn append(&mut self, record: &str) -> KvResult<()> {
        if self.file.is_none() {
            let f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            self.file = Some(f);
        }

        let line = format!("{}\n", record);
        let res = match self.file.as_mut() {
            Some(f) => write_durably(f, line.as_bytes()).await,
            None => Ok(()),
        };
        if res.is_err() {
            // 句柄可能已损坏，下次重新打开
            self.file = None;
        }
        res.map_err(Into::into)
    }

    /// 启动时的同步全量读取：去掉首尾空白，跳过空行
    pub fn read_logs(&self) -> Result<Vec<String>> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = ?self.path, "no existing AOF found, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read AOF {:?}", self.path));
            }
        };

        let lines: Vec<String> = data
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        info!(path = ?self.path, commands = lines.len(), "AOF recovery loaded commands from disk");
        Ok(lines)
    }

    /// 用给定记录整体替换日志
    pub async fn rewrite(&mut self, records: Vec<String>) -> Result<()> {
        let path = self.path.clone();
        let res = tokio::task::spawn_blocking(move || write_compacted(&path, &records))
            .await
            .context("AOF rewrite task panicked")?;
        // 不论成功与否都丢弃旧句柄：成功时它指向被替换掉的文件
        self.file = None;
        res
    }
}

async fn write_durably(f: &mut tokio::fs::File, bytes: &[u8]) -> std::io::Result<()> {
    f.write_all(bytes).await?;
    f.flush().await?;
    f.sync_data().await
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

/// 写临时文件 → fsync → 原子 rename。
/// `NamedTempFile` 在未 persist 时 drop 会删除自身，所以任何一步失败都不会留下临时文件。
fn write_compacted(path: &Path, records: &[String]) -> Result<()> {
    let dir = parent_dir(path).unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".aof-rewrite-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create temp file in {:?}", dir))?;

    {
        let mut w = BufWriter::new(tmp.as_file_mut());
        for rec in records {
            writeln!(w, "{}", rec)?;
        }
        w.flush()?;
    }
    tmp.as_file().sync_all()?;

    if let Err(e) = tmp.persist(path) {
        // e.file 在这里 drop，临时文件随之删除
        return Err(anyhow::Error::new(e.error))
            .with_context(|| format!("Failed to swap compacted AOF into {:?}", path));
    }
    Ok(())
}

/// 后台压缩任务：每隔 `interval` 压缩一次，收到关闭信号后退出
pub async fn start_compactor(
    engine: Arc<Engine>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut iv = time::interval_at(time::Instant::now() + interval, interval);
    loop {
        tokio::select! {
            _ = iv.tick() => {
                info!("housekeeper triggering AOF compaction");
                match engine.compact().await {
                    Ok(n) => info!(keys = n, "AOF compaction successful"),
                    Err(e) => error!(error = ?e, "AOF compaction failed"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    warn!("compaction housekeeper stopped");
}
