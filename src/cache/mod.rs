// 缓存模块
// 内存读穿缓存：容量/TTL 淘汰与并发请求合并

pub mod models;
pub mod operations;

// 重新导出常用类型，方便其他模块使用
pub use models::{CacheConfig, CacheStats, FetchOutcome};
pub use operations::{LoadToken, ReadThroughCache};
