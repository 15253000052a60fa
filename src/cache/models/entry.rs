use std::time::Duration;

use tokio::time::Instant;

/// 缓存条目，只在缓存内部持有
#[derive(Debug)]
pub(crate) struct CacheEntry<V> {
    pub value: V,
    pub inserted: Instant,
    pub last_accessed: Instant,
    /// 全局单调递增的访问序号，时间戳相同时用于裁决
    pub access_seq: u64,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, now: Instant, seq: u64) -> Self {
        Self {
            value,
            inserted: now,
            last_accessed: now,
            access_seq: seq,
        }
    }

    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted) >= ttl
    }

    pub fn touch(&mut self, now: Instant, seq: u64) {
        self.last_accessed = now;
        self.access_seq = seq;
    }

    /// LRU 排序键，越小越先被淘汰
    pub fn recency(&self) -> (Instant, u64) {
        (self.last_accessed, self.access_seq)
    }
}
