// src/engine/cache.rs
//! 热缓存：key → 链表句柄 的映射 + LRU 链表
//!
//! 热缓存只是一个最近访问窗口，它的内容不影响命令结果，只影响命中统计。

use std::collections::HashMap;

use super::lru::LruList;

#[derive(Debug)]
pub struct HotCache {
    capacity: usize,
    index: HashMap<String, usize>,
    list: LruList,
}

impl HotCache {
    pub fn new(capacity: usize) -> Self {
        HotCache {
            capacity,
            index: HashMap::with_capacity(capacity + 1),
            list: LruList::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// 命中时把节点挪到最近使用端并返回值
    pub fn touch(&mut self, key: &str) -> Option<String> {
        let idx = *self.index.get(key)?;
        self.list.move_to_front(idx);
        Some(self.list.get(idx).value.clone())
    }

    /// 插入一个新热点，超出容量时淘汰最久未使用的 key 并返回它
    pub fn insert(&mut self, key: String, value: String) -> Option<String> {
        if let Some(&idx) = self.index.get(&key) {
            self.list.get_mut(idx).value = value;
            self.list.move_to_front(idx);
            return None;
        }
        let idx = self.list.push_front(key.clone(), value);
        self.index.insert(key, idx);

        if self.index.len() > self.capacity {
            let lru = self.list.pop_back()?;
            self.index.remove(&lru.key);
            return Some(lru.key);
        }
        None
    }

    /// 只更新已经在热缓存里的 key；不在缓存中返回 false，且不会插入
    pub fn update(&mut self, key: &str, value: &str) -> bool {
        match self.index.get(key) {
            Some(&idx) => {
                self.list.get_mut(idx).value = value.to_string();
                self.list.move_to_front(idx);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        match self.index.remove(key) {
            Some(idx) => {
                self.list.remove(idx);
                true
            }
            None => false,
        }
    }

    /// 最近使用 → 最久未使用
    pub fn keys(&self) -> Vec<String> {
        self.list.iter().map(|node| node.key.clone()).collect()
    }
}
