// src/engine/lru.rs
//! LRU 淘汰链表
//!
//! 用一个 `Vec` 做节点池（arena），节点之间用下标互相引用，避免指针链表的所有权环。
//! - 0 号槽位是头哨兵，1 号槽位是尾哨兵，两者永不移除
//! - 从 head 到 tail 的顺序 = 最近使用 → 最久未使用
//! - 被释放的槽位放进 `free`，下次插入时复用

pub const HEAD: usize = 0;
pub const TAIL: usize = 1;

/// 链表节点：缓存的 key / value 以及前后指针（槽位下标）
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub key: String,
    pub value: String,
    prev: usize,
    next: usize,
}

#[derive(Debug)]
pub struct LruList {
    nodes: Vec<Node>,
    free: Vec<usize>,
    len: usize,
}

impl LruList {
    pub fn new() -> Self {
        let head = Node { next: TAIL, ..Node::default() };
        let tail = Node { prev: HEAD, ..Node::default() };
        LruList {
            nodes: vec![head, tail],
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 在最近使用端插入新节点，返回它的句柄
    pub fn push_front(&mut self, key: String, value: String) -> usize {
        let node = Node { key, value, prev: HEAD, next: HEAD };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.link_front(idx);
        self.len += 1;
        idx
    }

    /// 把已有节点挪到最近使用端
    pub fn move_to_front(&mut self, idx: usize) {
        debug_assert!(idx != HEAD && idx != TAIL);
        self.unlink(idx);
        self.link_front(idx);
    }

    /// 摘除节点并释放槽位，返回节点内容
    pub fn remove(&mut self, idx: usize) -> Node {
        debug_assert!(idx != HEAD && idx != TAIL);
        self.unlink(idx);
        self.free.push(idx);
        self.len -= 1;
        std::mem::take(&mut self.nodes[idx])
    }

    /// 弹出紧挨尾哨兵的节点（最久未使用）
    pub fn pop_back(&mut self) -> Option<Node> {
        let lru = self.nodes[TAIL].prev;
        if lru == HEAD {
            return None;
        }
        Some(self.remove(lru))
    }

    pub fn get(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Node {
        &mut self.nodes[idx]
    }

    /// 从最近使用到最久未使用依次遍历
    pub fn iter(&self) -> Iter<'_> {
        Iter { list: self, cursor: self.nodes[HEAD].next }
    }

    fn link_front(&mut self, idx: usize) {
        let first = self.nodes[HEAD].next;
        self.nodes[idx].prev = HEAD;
        self.nodes[idx].next = first;
        self.nodes[first].prev = idx;
        self.nodes[HEAD].next = idx;
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }
}

impl Default for LruList {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Iter<'a> {
    list: &'a LruList,
    cursor: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == TAIL {
            return None;
        }
        let node = &self.list.nodes[self.cursor];
        self.cursor = node.next;
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(list: &LruList) -> Vec<&str> {
        list.iter().map(|n| n.key.as_str()).collect()
    }

    #[test]
    fn test_push_and_order() {
        let mut list = LruList::new();
        assert!(list.is_empty());
        list.push_front("a".into(), "1".into());
        list.push_front("b".into(), "2".into());
        list.push_front("c".into(), "3".into());
        assert_eq!(keys(&list), vec!["c", "b", "a"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_move_to_front_and_pop_back() {
        let mut list = LruList::new();
        let a = list.push_front("a".into(), "1".into());
        list.push_front("b".into(), "2".into());
        list.move_to_front(a);
        assert_eq!(keys(&list), vec!["a", "b"]);

        let lru = list.pop_back().unwrap();
        assert_eq!(lru.key, "b");
        assert_eq!(keys(&list), vec!["a"]);

        list.pop_back().unwrap();
        assert!(list.pop_back().is_none(), "只剩哨兵时不应弹出任何节点");
    }

    // 释放的槽位会被复用，哨兵不受影响
    #[test]
    fn test_slot_reuse() {
        let mut list = LruList::new();
        let a = list.push_front("a".into(), "1".into());
        let removed = list.remove(a);
        assert_eq!(removed.value, "1");
        let b = list.push_front("b".into(), "2".into());
        assert_eq!(a, b);
        assert_eq!(list.get(b).key, "b");
        assert!(b != HEAD && b != TAIL);
        assert_eq!(keys(&list), vec!["b"]);
    }
}
