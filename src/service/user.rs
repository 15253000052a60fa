use std::path::Path;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::RwLock;

use crate::cache::{CacheConfig, FetchOutcome, LoadToken, ReadThroughCache};
use crate::database::UserStore;
use crate::error::{ErrorClass, UserError};
use crate::models::{User, UserId, validate_user};
use crate::remote::UserSource;
use crate::service::retry::{RetryPolicy, fetch_with_retry};
use crate::storage::{ExportError, export_users};

pub type UserCache = ReadThroughCache<UserId, Arc<User>>;

/// 用户服务，对外唯一的读写入口
pub struct UserService<R, S> {
    cache: UserCache,
    remote: Arc<R>,
    store: Arc<S>,
    retry: RetryPolicy,
    /// 读路径回写本地库持读锁，写操作更新缓存与本地库持写锁
    write_gate: Arc<RwLock<()>>,
}

impl<R, S> Clone for UserService<R, S> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            remote: Arc::clone(&self.remote),
            store: Arc::clone(&self.store),
            retry: self.retry,
            write_gate: Arc::clone(&self.write_gate),
        }
    }
}

impl<R: UserSource, S: UserStore> UserService<R, S> {
    pub fn new(remote: R, store: S, cache: CacheConfig, retry: RetryPolicy) -> Self {
        Self::from_parts(Arc::new(remote), Arc::new(store), cache, retry)
    }

    pub fn from_parts(remote: Arc<R>, store: Arc<S>, cache: CacheConfig, retry: RetryPolicy) -> Self {
        Self {
            cache: ReadThroughCache::new(cache),
            remote,
            store,
            retry,
            write_gate: Arc::new(RwLock::new(())),
        }
    }

    pub fn cache(&self) -> &UserCache {
        &self.cache
    }

    /// 按ID读取用户
    ///
    /// 整个多层查找都在缓存的合并加载内完成，同一个ID的并发请求只会
    /// 查询一次本地库与远程。
    pub async fn lookup(&self, id: UserId) -> Result<Arc<User>, UserError> {
        let remote = Arc::clone(&self.remote);
        let store = Arc::clone(&self.store);
        let retry = self.retry;
        let gate = Arc::clone(&self.write_gate);

        let outcome = self
            .cache
            .get_or_load(id, move |id, token| {
                load_user(remote, store, retry, gate, id, token)
            })
            .await;

        match outcome {
            FetchOutcome::Found(user) => Ok(user),
            FetchOutcome::NotFound => Err(UserError::NotFound(id)),
            FetchOutcome::Transient(cause) => {
                tracing::error!("Lookup of user {} failed after retries: {}", id, cause);
                Err(UserError::Upstream {
                    class: ErrorClass::Transient,
                    cause,
                })
            }
            FetchOutcome::Permanent(cause) => {
                tracing::error!("Lookup of user {} failed: {}", id, cause);
                Err(UserError::Upstream {
                    class: ErrorClass::Permanent,
                    cause,
                })
            }
        }
    }

    /// 列出全部用户：本地库非空时直接返回，否则从远程拉取并写入本地库
    pub async fn list(&self) -> Result<Vec<User>, UserError> {
        match self.store.all().await {
            Ok(users) if !users.is_empty() => return Ok(users),
            Ok(_) => {}
            Err(e) => tracing::warn!("Reading local users failed, falling back to remote: {}", e),
        }

        tracing::info!("Fetching all users from remote");
        let users = self.remote.fetch_all().await.map_err(UserError::upstream)?;
        self.store_all(&users).await;
        Ok(users)
    }

    pub async fn create(&self, user: User) -> Result<Arc<User>, UserError> {
        validate_user(&user)?;

        let created = Arc::new(self.remote.create(&user).await.map_err(UserError::upstream)?);
        tracing::info!("Created user {}", created.id);

        self.cache.put(created.id, Arc::clone(&created));
        self.store_best_effort(&created).await;
        Ok(created)
    }

    pub async fn update(&self, id: UserId, user: User) -> Result<Arc<User>, UserError> {
        validate_user(&user)?;

        let updated = self
            .remote
            .update(id, &user)
            .await
            .map_err(UserError::upstream)?
            .ok_or(UserError::NotFound(id))?;
        let updated = Arc::new(updated.with_id(id));
        tracing::info!("Updated user {}", id);

        let _gate = self.write_gate.write().await;
        self.cache.put(id, Arc::clone(&updated));
        self.store_best_effort(&updated).await;
        Ok(updated)
    }

    pub async fn delete(&self, id: UserId) -> Result<User, UserError> {
        let deleted = self
            .remote
            .delete(id)
            .await
            .map_err(UserError::upstream)?
            .ok_or(UserError::NotFound(id))?;
        tracing::info!("Deleted user {}", id);

        let _gate = self.write_gate.write().await;
        self.cache.invalidate(&id);
        if let Err(e) = self.store.delete(id).await {
            tracing::warn!("Failed to delete user {} from local store: {}", id, e);
        }
        Ok(deleted)
    }

    /// 用远程数据重建本地库，返回写入的用户数
    ///
    /// 远程读取失败时本地库保持不变。
    pub async fn refresh_local_store(&self) -> Result<usize, UserError> {
        tracing::info!("Synchronising local store with remote");
        let users = self.remote.fetch_all().await.map_err(UserError::upstream)?;

        if let Err(e) = self.store.clear().await {
            tracing::warn!("Failed to clear local store before refresh: {}", e);
        }

        let valid: Vec<User> = users
            .into_iter()
            .filter(|user| match validate_user(user) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Skipping user {} during refresh: {}", user.id, e);
                    false
                }
            })
            .collect();

        let stored = self.store_all(&valid).await;
        tracing::info!("Local store synchronised with {} users", stored);
        Ok(stored)
    }

    /// 把当前用户列表导出为 JSON 文件
    pub async fn export_to(&self, path: impl AsRef<Path>) -> Result<usize, ExportError> {
        let users = self.list().await?;
        export_users(path, &users).await
    }

    async fn store_best_effort(&self, user: &User) {
        if let Err(e) = self.store.put(user).await {
            tracing::warn!("Failed to persist user {} locally: {}", user.id, e);
        }
    }

    async fn store_all(&self, users: &[User]) -> usize {
        let results = join_all(users.iter().map(|user| self.store.put(user))).await;

        let mut stored = 0;
        for (user, result) in users.iter().zip(results) {
            match result {
                Ok(()) => stored += 1,
                Err(e) => tracing::warn!("Failed to persist user {} locally: {}", user.id, e),
            }
        }
        stored
    }
}

/// 缓存未命中时的加载流程：本地库 -> 远程（带重试），远程结果回写本地库
///
/// 加载期间该用户被更新或删除时不回写，避免旧数据覆盖写操作的结果。
async fn load_user<R: UserSource, S: UserStore>(
    remote: Arc<R>,
    store: Arc<S>,
    retry: RetryPolicy,
    gate: Arc<RwLock<()>>,
    id: UserId,
    token: LoadToken,
) -> FetchOutcome<Arc<User>> {
    match store.get(id).await {
        Ok(Some(user)) => {
            tracing::debug!("User {} served from local store", id);
            return FetchOutcome::Found(Arc::new(user));
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("Local store read failed for user {}: {}", id, e),
    }

    tracing::info!("Fetching user {} from remote", id);
    match fetch_with_retry(remote.as_ref(), id, &retry).await {
        Ok(Some(user)) => {
            let _gate = gate.read().await;
            if token.is_stale() {
                tracing::debug!("User {} changed while loading, skipping write-back", id);
            } else if let Err(e) = store.put(&user).await {
                // 本地写入失败只影响以后的兜底能力
                tracing::warn!("Failed to persist user {} locally: {}", id, e);
            }
            FetchOutcome::Found(Arc::new(user))
        }
        Ok(None) => FetchOutcome::NotFound,
        Err(e) if e.is_transient() => FetchOutcome::Transient(Arc::new(e)),
        Err(e) => FetchOutcome::Permanent(Arc::new(e)),
    }
}
