// 数据库模块
// 本地用户库：读路径的兜底与远程结果的回写目标

pub mod models; // 数据库实体定义
pub mod operations; // 数据库操作实现

use std::future::Future;

use crate::error::StoreError;
use crate::models::{User, UserId};

// 重新导出常用类型，方便其他模块使用
pub use models::user::UserRow;
pub use operations::user::SqliteUserStore;

/// 本地持久化存储
///
/// 不同键之间可以安全并发访问。
pub trait UserStore: Send + Sync + 'static {
    fn get(&self, id: UserId) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    /// 插入或覆盖
    fn put(&self, user: &User) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 返回是否删除了记录
    fn delete(&self, id: UserId) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn all(&self) -> impl Future<Output = Result<Vec<User>, StoreError>> + Send;

    /// 清空并返回删除的行数
    fn clear(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;
}
