#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use users_backend::database::UserStore;
use users_backend::error::{RemoteError, StoreError};
use users_backend::models::{User, UserId};
use users_backend::remote::UserSource;

pub fn leanne() -> User {
    User::new(1, "Leanne Graham", "Bret", "Sincere@april.biz")
}

pub fn ervin() -> User {
    User::new(2, "Ervin Howell", "Antonette", "Shanna@melissa.tv")
}

/// 记录调用次数的远程 API 替身
#[derive(Default)]
pub struct FakeRemote {
    users: Mutex<HashMap<UserId, User>>,
    failures: Mutex<VecDeque<RemoteError>>,
    delay: Mutex<Duration>,
    fetch_calls: AtomicUsize,
    fetch_all_calls: AtomicUsize,
    write_calls: AtomicUsize,
}

impl FakeRemote {
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let remote = Self::default();
        for user in users {
            remote.insert(user);
        }
        remote
    }

    pub fn insert(&self, user: User) {
        self.users.lock().unwrap().insert(user.id, user);
    }

    /// 下一次调用返回该错误（按顺序排队）
    pub fn fail_next(&self, err: RemoteError) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_all_calls(&self) -> usize {
        self.fetch_all_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    async fn respond(&self) -> Result<(), RemoteError> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl UserSource for FakeRemote {
    async fn fetch(&self, id: UserId) -> Result<Option<User>, RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        // 先取数据再模拟延迟，延迟期间的写入不影响这次响应
        let snapshot = self.users.lock().unwrap().get(&id).cloned();
        self.respond().await?;
        Ok(snapshot)
    }

    async fn fetch_all(&self) -> Result<Vec<User>, RemoteError> {
        self.fetch_all_calls.fetch_add(1, Ordering::SeqCst);
        self.respond().await?;
        let mut users: Vec<User> = self.users.lock().unwrap().values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn create(&self, user: &User) -> Result<User, RemoteError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.respond().await?;
        let mut users = self.users.lock().unwrap();
        let next = users.keys().map(|id| id.0).max().unwrap_or(0) + 1;
        let created = user.with_id(UserId(next));
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: UserId, user: &User) -> Result<Option<User>, RemoteError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.respond().await?;
        let mut users = self.users.lock().unwrap();
        if !users.contains_key(&id) {
            return Ok(None);
        }
        let updated = user.with_id(id);
        users.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete(&self, id: UserId) -> Result<Option<User>, RemoteError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.respond().await?;
        Ok(self.users.lock().unwrap().remove(&id))
    }
}

/// 可注入故障的内存本地库替身
#[derive(Default)]
pub struct FakeStore {
    users: Mutex<HashMap<UserId, User>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    get_calls: AtomicUsize,
    put_calls: AtomicUsize,
}

impl FakeStore {
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let store = Self::default();
        for user in users {
            store.users.lock().unwrap().insert(user.id, user);
        }
        store
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn contains(&self, id: UserId) -> Option<User> {
        self.users.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    fn unavailable() -> StoreError {
        StoreError::Database(sqlx::Error::PoolTimedOut)
    }
}

impl UserStore for FakeStore {
    async fn get(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.contains(id))
    }

    async fn put(&self, user: &User) -> Result<(), StoreError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.users.lock().unwrap().insert(user.id, user.clone());
        Ok(())
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.users.lock().unwrap().remove(&id).is_some())
    }

    async fn all(&self) -> Result<Vec<User>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let mut users: Vec<User> = self.users.lock().unwrap().values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let mut users = self.users.lock().unwrap();
        let removed = users.len() as u64;
        users.clear();
        Ok(removed)
    }
}
