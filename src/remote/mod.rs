// 远程用户 API

pub mod client;
pub mod models;

use std::future::Future;

use crate::error::RemoteError;
use crate::models::{User, UserId};

pub use client::HttpUserApi;

/// 远程用户数据源
///
/// 不持有状态；`Ok(None)` 表示远程确认不存在该用户。
pub trait UserSource: Send + Sync + 'static {
    fn fetch(&self, id: UserId) -> impl Future<Output = Result<Option<User>, RemoteError>> + Send;

    fn fetch_all(&self) -> impl Future<Output = Result<Vec<User>, RemoteError>> + Send;

    fn create(&self, user: &User) -> impl Future<Output = Result<User, RemoteError>> + Send;

    fn update(
        &self,
        id: UserId,
        user: &User,
    ) -> impl Future<Output = Result<Option<User>, RemoteError>> + Send;

    /// 返回被删除的用户
    fn delete(&self, id: UserId) -> impl Future<Output = Result<Option<User>, RemoteError>> + Send;
}
