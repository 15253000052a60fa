/// 缓存数据模型

pub mod entry;
pub mod outcome;

pub(crate) use entry::CacheEntry;
pub use outcome::FetchOutcome;

use std::time::Duration;

/// 缓存容量与过期配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// 触发 LRU 淘汰前允许的最大条目数
    pub capacity: usize,
    /// 自写入起算的存活时间
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            ttl: Duration::from_secs(300),
        }
    }
}

/// 缓存统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// 作为 leader 发起的加载次数
    pub loads: u64,
    /// 加入已有加载的次数
    pub joins: u64,
    pub evictions: u64,
    pub expirations: u64,
}
