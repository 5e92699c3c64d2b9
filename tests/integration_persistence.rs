// tests/integration_persistence.rs

//! 集成测试：验证 AOF 持久化、重启重放与压缩
//! 流程：
//! 1. 在临时目录打开引擎，执行若干 SET/DEL/INCR，写入 AOF
//! 2. “重启”：用同一个 AOF 路径重新打开引擎
//! 3. 验证重放结果、TTL 重新计时、热缓存冷启动
//! 4. 压缩后再重放，结果与压缩前一致

use std::{fs, time::Duration};
use tempfile::tempdir;
use anyhow::Result;

use crab_cage_kv::engine::Engine;

#[tokio::test]
async fn test_aof_persistence_and_replay() -> Result<()> {
    let tmp = tempdir()?;
    let aof_path = tmp.path().join("persistence").join("appendonly.aof");

    let e1 = Engine::open(3, &aof_path)?;
    e1.set("k1", "v1", None).await;
    e1.set("k2", "hello world", None).await;
    assert!(e1.delete("k1").await);
    e1.set("k3", "v3", Some(60)).await;
    assert_eq!(e1.increment("counter").await?, 1);
    assert_eq!(e1.increment("counter").await?, 2);
    e1.get("k2").await;
    drop(e1);

    let log = fs::read_to_string(&aof_path)?;
    assert_eq!(
        log.lines().collect::<Vec<_>>(),
        vec![
            "SET k1 v1",
            "SET k2 hello world",
            "DEL k1",
            "SET k3 v3 EX 60",
            "SET counter 1",
            "SET counter 2",
        ],
        "每条写命令一行，GET 不写日志"
    );

    // “重启”
    let e2 = Engine::open(3, &aof_path)?;
    let snap = e2.snapshot().await;
    assert!(!snap.contains_key("k1"), "k1 应被删除");
    assert_eq!(snap.get("k2").map(String::as_str), Some("hello world"));
    assert_eq!(snap.get("counter").map(String::as_str), Some("2"));

    // TTL 按重放时刻重新计时
    let ttl = e2.ttl("k3").await.expect("k3 应带 TTL");
    assert!(ttl > Duration::from_secs(58) && ttl <= Duration::from_secs(60));

    // 热缓存冷启动，统计从零开始
    assert!(e2.hot_keys().await.is_empty());
    let info = e2.info().await;
    assert_eq!((info.hits, info.misses, info.total_commands), (0, 0, 0));
    assert_eq!(info.keys_in_db, 3);
    Ok(())
}

#[tokio::test]
async fn test_lazy_expiry_is_not_replayed() -> Result<()> {
    let tmp = tempdir()?;
    let aof_path = tmp.path().join("appendonly.aof");

    let e1 = Engine::open(2, &aof_path)?;
    e1.set("x", "10", Some(1)).await;
    e1.set("y", "keep", None).await;
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(e1.get("x").await, None, "过期后 GET 应返回空");
    drop(e1);

    let e2 = Engine::open(2, &aof_path)?;
    assert_eq!(e2.get("x").await, None, "重放后 x 不应复活");
    assert_eq!(e2.get("y").await.as_deref(), Some("keep"));
    Ok(())
}

#[tokio::test]
async fn test_compaction_keeps_live_state() -> Result<()> {
    let tmp = tempdir()?;
    let aof_path = tmp.path().join("appendonly.aof");

    let e1 = Engine::open(2, &aof_path)?;
    for i in 0..5 {
        e1.set("a", &i.to_string(), None).await;
    }
    e1.set("b", "two words", Some(100)).await;
    e1.set("c", "gone", None).await;
    e1.delete("c").await;
    e1.set("short", "lived", Some(1)).await;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    // short 已过期但还没被清理：压缩时直接丢弃
    assert_eq!(e1.compact().await?, 2);
    let first = fs::read_to_string(&aof_path)?;
    assert_eq!(first, "SET a 4\nSET b two words EX 99\n");

    // 对已压缩的日志再压缩一次，内容不变
    assert_eq!(e1.compact().await?, 2);
    assert_eq!(fs::read_to_string(&aof_path)?, first);

    // 压缩后继续写入，追加到新文件
    e1.set("d", "1", None).await;
    let before = e1.snapshot().await;
    drop(e1);

    let e2 = Engine::open(2, &aof_path)?;
    let mut after = e2.snapshot().await;
    assert_eq!(after.remove("d").as_deref(), Some("1"));
    let mut before = before;
    before.remove("d");
    before.remove("short");
    assert_eq!(after, before, "压缩后重放得到相同的数据集（已过期 key 除外）");
    assert!(e2.ttl("b").await.is_some());
    Ok(())
}

#[tokio::test]
async fn test_sweep_removes_expired_records_from_compacted_log() -> Result<()> {
    let tmp = tempdir()?;
    let aof_path = tmp.path().join("appendonly.aof");

    let e = Engine::open(2, &aof_path)?;
    e.set("x", "10", Some(1)).await;
    tokio::time::sleep(Duration::from_millis(2000)).await;

    assert_eq!(e.sweep_expired().await, vec!["x".to_string()]);
    e.compact().await?;
    assert_eq!(fs::read_to_string(&aof_path)?, "", "日志里不应再有存活的 x");
    Ok(())
}
