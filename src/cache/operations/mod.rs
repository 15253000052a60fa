/// 缓存操作

pub mod read_through;

pub use read_through::{LoadToken, ReadThroughCache};
