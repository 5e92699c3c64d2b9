// tests/integration_engine.rs

use anyhow::Result;
use std::sync::Arc;
use tempfile::{TempDir, tempdir};

use crab_cage_kv::{
    engine::{Engine, execute},
    protocol::Command,
};

async fn open(capacity: usize) -> Result<(TempDir, Arc<Engine>)> {
    let tmp = tempdir()?;
    let engine = Engine::open(capacity, tmp.path().join("appendonly.aof"))?;
    Ok((tmp, engine))
}

/// 辅助：执行一行文本命令，返回回复文本
async fn run(engine: &Engine, line: &str) -> String {
    match Command::parse(line) {
        Some(cmd) => execute(engine, &cmd).await.text,
        None => "ERROR: Unknown Command".to_string(),
    }
}

#[tokio::test]
async fn test_lru_evicts_least_recently_read() -> Result<()> {
    let (_tmp, e) = open(3).await?;
    for k in ["a", "b", "c", "d"] {
        e.set(k, k, None).await;
    }
    // 用 GET 填满热缓存
    for k in ["a", "b", "c"] {
        e.get(k).await;
    }
    // 再读一次 a，b 变成最久未读
    e.get("a").await;
    // 对热点 c 的 SET 也会刷新它的位置
    e.set("c", "C", None).await;
    // 冷 GET 触发淘汰
    e.get("d").await;

    assert_eq!(e.hot_keys().await, vec!["d", "c", "a"]);
    let info = e.info().await;
    assert_eq!(info.keys_in_hot_cache, 3);
    assert_eq!(info.keys_in_db, 4, "淘汰只影响热缓存，不影响数据集");
    Ok(())
}

#[tokio::test]
async fn test_write_without_promotion() -> Result<()> {
    let (_tmp, e) = open(2).await?;
    for i in 0..10 {
        e.set(&format!("k{}", i), "v", None).await;
    }
    assert!(e.hot_keys().await.is_empty(), "只写负载不会填充热缓存");

    e.get("k7").await;
    assert_eq!(e.hot_keys().await, vec!["k7"]);
    Ok(())
}

#[tokio::test]
async fn test_wire_level_scenario() -> Result<()> {
    let (_tmp, e) = open(2).await?;

    assert_eq!(run(&e, "SET a 1").await, "OK");
    assert_eq!(run(&e, "SET b 2").await, "OK");
    assert_eq!(run(&e, "GET a").await, "1");
    assert_eq!(run(&e, "SET c 3").await, "OK");
    assert_eq!(run(&e, "GET b").await, "2");
    assert_eq!(run(&e, "GET c").await, "3");
    assert_eq!(run(&e, "GET b").await, "2");

    assert_eq!(run(&e, "DEL a").await, "OK");
    assert_eq!(run(&e, "DEL a").await, "(nil)");
    assert_eq!(run(&e, "GET a").await, "(nil)");

    assert_eq!(run(&e, "INCR hits").await, "1");
    assert_eq!(run(&e, "SET name crab cage").await, "OK");
    assert_eq!(run(&e, "GET name").await, "crab cage");
    assert_eq!(run(&e, "INCR name").await, "ERROR: Value is not an integer");

    assert_eq!(run(&e, "FLUSHALL").await, "ERROR: Unknown Command");
    assert_eq!(run(&e, "GET").await, "ERROR: Unknown Command");

    let info = run(&e, "INFO").await;
    assert!(info.contains("keys_in_db: 4"), "{}", info);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_clients_keep_structures_consistent() -> Result<()> {
    let (_tmp, e) = open(8).await?;
    let mut tasks = Vec::new();
    for t in 0..8 {
        let e = e.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..50 {
                let key = format!("k{}", (t * 7 + i) % 20);
                e.set(&key, &i.to_string(), None).await;
                e.get(&key).await;
                if i % 5 == 0 {
                    e.delete(&key).await;
                }
            }
        }));
    }
    for task in tasks {
        task.await?;
    }

    let snap = e.snapshot().await;
    let hot = e.hot_keys().await;
    assert!(hot.len() <= 8);
    for k in &hot {
        assert!(snap.contains_key(k), "热缓存中的 {} 必须在数据集中", k);
    }
    Ok(())
}
