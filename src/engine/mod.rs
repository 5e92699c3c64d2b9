// src/engine/mod.rs

//! # 引擎模块
//!
//! `engine` 是整个 KV 服务的核心：
//! - `db`：全量数据集，无上限，是其它所有结构的超集
//! - `expiries`：带 TTL 的 key → 绝对过期时间
//! - `cache`：有容量上限的热缓存（LRU），只有 GET 会把冷 key 提升进来
//! - AOF：每次写操作都追加一条记录
//!
//! 所有状态放在同一把 `tokio::sync::Mutex`（gate）后面，一次逻辑操作只拿一次锁；
//! INCR 例外，它是 GET + SET 两次独立加锁，不是原子的，并且会丢掉原有 TTL。

pub mod cache;
pub mod exec;
pub mod lru;

pub use cache::HotCache;
pub use exec::{Reply, execute};

use anyhow::Result;
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    path::Path,
    sync::Arc,
    time::Duration,
};
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, error, warn};

use crate::error::{KvError, KvResult};
use crate::persistence::AofLog;
use crate::protocol::{self, Command};

/// 运行期统计，不落盘
#[derive(Debug, Default, Clone, Copy)]
struct Stats {
    cache_hits: u64,
    cache_misses: u64,
    total_commands: u64,
}

/// gate 保护的全部可变状态
#[derive(Debug)]
struct Store {
    db: HashMap<String, String>,
    expiries: HashMap<String, Instant>,
    cache: HotCache,
    stats: Stats,
    aof: AofLog,
}

impl Store {
    fn is_expired(&self, key: &str, now: Instant) -> bool {
        self.expiries.get(key).is_some_and(|at| now > *at)
    }

    /// 从 db / expiries / 热缓存中同时删掉 key，返回删除前 key 是否在 db 中
    fn remove_entry(&mut self, key: &str) -> bool {
        let existed = self.db.remove(key).is_some();
        self.expiries.remove(key);
        self.cache.remove(key);
        existed
    }

    /// 追加 AOF；I/O 错误只记日志，不影响内存状态
    async fn log(&mut self, record: String) {
        if let Err(e) = self.aof.append(&record).await {
            error!(error = %e, record = %record, "failed to append to AOF");
        }
    }

    /// 启动重放：只写 db / expiries，绕过热缓存和统计
    fn replay(&mut self, lines: &[String]) -> usize {
        let now = Instant::now();
        let mut applied = 0;
        for line in lines {
            match Command::parse(line) {
                Some(Command::Set { key, value, ttl }) => {
                    match ttl {
                        Some(secs) => {
                            self.expiries.insert(key.clone(), expiry_at(now, secs));
                        }
                        None => {
                            self.expiries.remove(&key);
                        }
                    }
                    self.db.insert(key, value);
                    applied += 1;
                }
                Some(Command::Del { key }) => {
                    self.db.remove(&key);
                    self.expiries.remove(&key);
                    applied += 1;
                }
                _ => warn!(line = %line, "skipping malformed AOF record"),
            }
        }
        applied
    }

    /// 压缩后的日志内容：每个存活 key 一条 SET，按 key 排序；
    /// 剩余 TTL 向上取整到秒，已过期但还没被清理的 key 直接丢弃
    fn compacted_records(&self, now: Instant) -> Vec<String> {
        let mut keys: Vec<&String> = self.db.keys().collect();
        keys.sort();

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let value = &self.db[key];
            match self.expiries.get(key) {
                None => records.push(protocol::set_record(key, value, None)),
                Some(at) if *at > now => {
                    // 按纳秒向上取整，不足 1ms 的剩余时间也要记成 EX 1，EX 0 会被当成永久 key
                    let nanos = at.duration_since(now).as_nanos();
                    let secs = u64::try_from(nanos.div_ceil(1_000_000_000)).unwrap_or(u64::MAX).max(1);
                    records.push(protocol::set_record(key, value, Some(secs)));
                }
                Some(_) => {}
            }
        }
        records
    }
}

/// TTL 上限约 100 年，超出的秒数按上限处理
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// `now + secs` 的过期时刻，不会因为超大的 TTL 溢出
fn expiry_at(now: Instant, secs: u64) -> Instant {
    let ttl = Duration::from_secs(secs).min(MAX_TTL);
    now.checked_add(ttl)
        .or_else(|| now.checked_add(Duration::from_secs(365 * 24 * 3600)))
        .unwrap_or(now)
}

/// INFO 的快照
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Info {
    pub keys_in_db: usize,
    pub keys_in_hot_cache: usize,
    pub hits: u64,
    pub misses: u64,
    pub total_commands: u64,
    pub uptime_secs: u64,
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "keys_in_db: {}", self.keys_in_db)?;
        writeln!(f, "keys_in_hot_cache: {}", self.keys_in_hot_cache)?;
        writeln!(f, "hits: {}", self.hits)?;
        writeln!(f, "misses: {}", self.misses)?;
        writeln!(f, "total_commands: {}", self.total_commands)?;
        write!(f, "uptime_secs: {}", self.uptime_secs)
    }
}

/// 存储引擎。通过 `Arc<Engine>` 在连接任务之间共享。
#[derive(Debug)]
pub struct Engine {
    gate: Mutex<Store>,
    started_at: Instant,
}

impl Engine {
    /// 打开 AOF，重放全部记录后返回引擎；热缓存从冷启动开始
    pub fn open<P: AsRef<Path>>(capacity: usize, aof_path: P) -> Result<Arc<Self>> {
        let aof = AofLog::open(aof_path)?;
        let lines = aof.read_logs()?;

        let mut store = Store {
            db: HashMap::new(),
            expiries: HashMap::new(),
            cache: HotCache::new(capacity),
            stats: Stats::default(),
            aof,
        };
        let applied = store.replay(&lines);
        debug!(applied, keys = store.db.len(), "AOF replay finished");

        Ok(Arc::new(Engine {
            gate: Mutex::new(store),
            started_at: Instant::now(),
        }))
    }

    /// GET：惰性过期 → 热缓存命中 → 冷命中并提升
    pub async fn get(&self, key: &str) -> Option<String> {
        let mut store = self.gate.lock().await;
        store.stats.total_commands += 1;

        if !store.db.contains_key(key) {
            return None;
        }

        if store.is_expired(key, Instant::now()) {
            store.remove_entry(key);
            store.log(protocol::del_record(key)).await;
            debug!(key, "lazily expired");
            return None;
        }

        if let Some(value) = store.cache.touch(key) {
            store.stats.cache_hits += 1;
            return Some(value);
        }

        store.stats.cache_misses += 1;
        let value = store.db.get(key)?.clone();
        if let Some(evicted) = store.cache.insert(key.to_string(), value.clone()) {
            debug!(key = %evicted, "evicted from hot cache");
        }
        Some(value)
    }

    /// SET：写 db，处理 TTL；只更新已经是热点的 key，不会把新 key 放进热缓存
    pub async fn set(&self, key: &str, value: &str, ttl: Option<u64>) {
        let mut store = self.gate.lock().await;
        let at = ttl.map(|secs| expiry_at(Instant::now(), secs));
        store.stats.total_commands += 1;
        store.db.insert(key.to_string(), value.to_string());

        match at {
            Some(at) => {
                store.expiries.insert(key.to_string(), at);
            }
            None => {
                store.expiries.remove(key);
            }
        }

        store.cache.update(key, value);
        store.log(protocol::set_record(key, value, ttl)).await;
    }

    /// DEL：key 存在时返回 true 并写一条 DEL 记录
    pub async fn delete(&self, key: &str) -> bool {
        let mut store = self.gate.lock().await;
        let existed = store.remove_entry(key);
        if existed {
            store.log(protocol::del_record(key)).await;
        }
        existed
    }

    /// INCR = GET + SET(无 TTL)；缺失的值按 0 处理
    pub async fn increment(&self, key: &str) -> KvResult<i64> {
        let current = self.get(key).await;
        let n = match current.as_deref() {
            None => 0,
            Some(s) => s.parse::<i64>().map_err(|_| KvError::NotAnInteger)?,
        };
        let next = n.checked_add(1).ok_or(KvError::Overflow)?;
        self.set(key, &next.to_string(), None).await;
        Ok(next)
    }

    /// 一次加锁内清掉所有已过期的 key，返回被清理的 key
    pub async fn sweep_expired(&self) -> Vec<String> {
        let mut store = self.gate.lock().await;
        let now = Instant::now();
        let mut expired: Vec<String> = store
            .expiries
            .iter()
            .filter(|(_, at)| now > **at)
            .map(|(k, _)| k.clone())
            .collect();
        expired.sort();

        for key in &expired {
            store.remove_entry(key);
            store.log(protocol::del_record(key)).await;
        }
        expired
    }

    /// 在 gate 内重写 AOF，返回写入的 key 数量
    pub async fn compact(&self) -> Result<usize> {
        let mut store = self.gate.lock().await;
        let records = store.compacted_records(Instant::now());
        let n = records.len();
        store.aof.rewrite(records).await?;
        Ok(n)
    }

    pub async fn info(&self) -> Info {
        let store = self.gate.lock().await;
        Info {
            keys_in_db: store.db.len(),
            keys_in_hot_cache: store.cache.len(),
            hits: store.stats.cache_hits,
            misses: store.stats.cache_misses,
            total_commands: store.stats.total_commands,
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }

    /// 热缓存中的 key，最近使用在前
    pub async fn hot_keys(&self) -> Vec<String> {
        self.gate.lock().await.cache.keys()
    }

    /// key 剩余的 TTL；没有 TTL 或 key 不存在返回 None
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let store = self.gate.lock().await;
        let at = store.expiries.get(key)?;
        Some(at.saturating_duration_since(Instant::now()))
    }

    /// 全量数据的有序拷贝，不触发过期也不影响统计
    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        let store = self.gate.lock().await;
        store.db.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub async fn aof_size(&self) -> u64 {
        self.gate.lock().await.aof.size()
    }
}
