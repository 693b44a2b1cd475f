/*
 * Creature Core - Change History
 * 开发心理过程:
 * 1. 固定容量的环形缓冲，超出容量时丢弃最旧的记录
 * 2. 每条记录同时保存原变更和它的逆变更，撤销时直接取用
 * 3. 记录时间戳方便调试和检查工具展示
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::changes::FormChange;
use crate::core::config::DEFAULT_HISTORY_CAPACITY;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub change: FormChange,
    pub inverse: FormChange,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ChangeHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for ChangeHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ChangeHistory {
    // 容量至少为1
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // 返回被挤出的最旧记录
    pub fn push(&mut self, change: FormChange, inverse: FormChange) -> Option<HistoryEntry> {
        self.entries.push_back(HistoryEntry {
            change,
            inverse,
            recorded_at: Utc::now(),
        });
        if self.entries.len() > self.capacity {
            self.entries.pop_front()
        } else {
            None
        }
    }

    // 撤销失败时把弹出的记录原样放回
    pub(crate) fn restore(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        self.evict_overflow();
    }

    pub fn pop(&mut self) -> Option<HistoryEntry> {
        self.entries.pop_back()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // 从最旧到最新
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn changes(&self) -> impl Iterator<Item = &FormChange> {
        self.entries.iter().map(|e| &e.change)
    }

    fn evict_overflow(&mut self) {
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}
