use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::time::Instant;

use crate::cache::models::{CacheConfig, CacheEntry, CacheStats, FetchOutcome};
use crate::error::LoadAborted;

type Settled<V> = Option<FetchOutcome<V>>;

/// 读穿缓存
///
/// 同一个键的并发 `get_or_load` 只会执行一次 loader，其余调用者等待
/// leader 的结算结果。加载在独立的 tokio 任务中运行，调用者放弃等待
/// 不会取消加载。
pub struct ReadThroughCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for ReadThroughCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// 交给 loader 的加载凭证
///
/// 加载期间同一个键被 `put`、`invalidate` 或 `clear` 过，凭证即失效，
/// 加载结果不再写入缓存。loader 自己的副作用（例如回写本地库）应先检查它。
#[derive(Debug, Clone, Default)]
pub struct LoadToken {
    stale: Arc<AtomicBool>,
}

impl LoadToken {
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }
}

struct Inner<K, V> {
    config: CacheConfig,
    state: Mutex<State<K, V>>,
}

struct Flight<V> {
    tx: watch::Sender<Settled<V>>,
    token: LoadToken,
}

struct State<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    in_flight: HashMap<K, Flight<V>>,
    seq: u64,
    stats: CacheStats,
}

enum Role<V> {
    Leader(watch::Receiver<Settled<V>>, LoadToken),
    Joiner(watch::Receiver<Settled<V>>),
}

impl<K, V> Inner<K, V> {
    fn lock(&self) -> MutexGuard<'_, State<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K: Hash + Eq + Clone, V: Clone> State<K, V> {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// 让同键进行中的加载失效
    fn supersede(&mut self, key: &K) {
        if let Some(flight) = self.in_flight.get(key) {
            flight.token.mark_stale();
        }
    }

    /// 返回未过期的值并刷新访问信息，过期条目顺手删除
    fn live(&mut self, key: &K, now: Instant, config: &CacheConfig) -> Option<V> {
        let expired = self.entries.get(key)?.is_expired(now, config.ttl);
        if expired {
            self.entries.remove(key);
            self.stats.expirations += 1;
            return None;
        }

        let seq = self.next_seq();
        let entry = self.entries.get_mut(key)?;
        entry.touch(now, seq);
        Some(entry.value.clone())
    }

    fn insert(&mut self, key: K, value: V, now: Instant, config: &CacheConfig) {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.is_expired(now, config.ttl));
        self.stats.expirations += (before - self.entries.len()) as u64;

        let seq = self.next_seq();
        self.entries.insert(key, CacheEntry::new(value, now, seq));

        while self.entries.len() > config.capacity {
            let Some(victim) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.recency())
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            self.entries.remove(&victim);
            self.stats.evictions += 1;
        }
    }
}

/// 加载没有正常结算（loader 或加载任务 panic、任务被丢弃）时移除 in-flight 记录，
/// 等待者因通道关闭而收到错误
struct FlightGuard<K: Hash + Eq, V> {
    inner: Arc<Inner<K, V>>,
    key: Option<K>,
}

impl<K: Hash + Eq, V> FlightGuard<K, V> {
    fn disarm(&mut self) {
        self.key = None;
    }
}

impl<K: Hash + Eq, V> Drop for FlightGuard<K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            tracing::warn!("Cache load ended without settling, releasing waiters");
            self.inner.lock().in_flight.remove(&key);
        }
    }
}

impl<K, V> ReadThroughCache<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    in_flight: HashMap::new(),
                    seq: 0,
                    stats: CacheStats::default(),
                }),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// 读取缓存，不做任何 I/O
    pub fn get(&self, key: &K) -> Option<V> {
        let mut state = self.inner.lock();
        let value = state.live(key, Instant::now(), &self.inner.config);
        if value.is_some() {
            state.stats.hits += 1;
        } else {
            state.stats.misses += 1;
        }
        value
    }

    /// 插入或整体替换条目，可能触发过期清理与 LRU 淘汰
    ///
    /// 同键进行中的加载随之失效，其结果不会覆盖这次写入。
    pub fn put(&self, key: K, value: V) {
        let mut state = self.inner.lock();
        state.supersede(&key);
        state.insert(key, value, Instant::now(), &self.inner.config);
    }

    pub fn invalidate(&self, key: &K) {
        let mut state = self.inner.lock();
        state.supersede(key);
        if state.entries.remove(key).is_some() {
            tracing::debug!("Invalidated cache entry {:?}", key);
        }
    }

    /// 清空缓存条目，进行中的加载照常结算但结果不再写入
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        for flight in state.in_flight.values() {
            flight.token.mark_stale();
        }
        state.entries.clear();
    }

    /// 当前条目数（包含尚未清理的过期条目）
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 正在进行的加载数
    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    /// 合并读取
    ///
    /// - 命中未过期条目：直接返回
    /// - 已有同键加载：等待其结果，不再调用 `loader`
    /// - 否则成为 leader：登记 in-flight，调用 `loader` 一次；成功且凭证未失效时
    ///   写入缓存，`NotFound` 和错误不缓存。结算后立即移除 in-flight 记录，
    ///   失败后的下一次调用会重新加载。
    pub async fn get_or_load<F, Fut>(&self, key: K, loader: F) -> FetchOutcome<V>
    where
        F: FnOnce(K, LoadToken) -> Fut + Send,
        Fut: Future<Output = FetchOutcome<V>> + Send + 'static,
    {
        let role = {
            let mut state = self.inner.lock();
            if let Some(value) = state.live(&key, Instant::now(), &self.inner.config) {
                state.stats.hits += 1;
                return FetchOutcome::Found(value);
            }
            state.stats.misses += 1;

            match state.in_flight.get(&key) {
                Some(flight) => {
                    let rx = flight.tx.subscribe();
                    state.stats.joins += 1;
                    Role::Joiner(rx)
                }
                None => {
                    let (tx, rx) = watch::channel(None);
                    let token = LoadToken::default();
                    state.in_flight.insert(
                        key.clone(),
                        Flight {
                            tx,
                            token: token.clone(),
                        },
                    );
                    state.stats.loads += 1;
                    Role::Leader(rx, token)
                }
            }
        };

        let mut rx = match role {
            Role::Joiner(rx) => {
                tracing::debug!("Joining in-flight load for {:?}", key);
                rx
            }
            Role::Leader(rx, token) => {
                tracing::debug!("Starting load for {:?}", key);
                let guard = FlightGuard {
                    inner: Arc::clone(&self.inner),
                    key: Some(key.clone()),
                };
                let load = loader(key.clone(), token.clone());
                Self::spawn_load(key, token, load, guard);
                rx
            }
        };

        match rx.wait_for(Option::is_some).await {
            Ok(settled) => settled
                .clone()
                .unwrap_or_else(|| FetchOutcome::Permanent(Arc::new(LoadAborted))),
            Err(_) => FetchOutcome::Permanent(Arc::new(LoadAborted)),
        }
    }

    fn spawn_load<Fut>(key: K, token: LoadToken, load: Fut, mut guard: FlightGuard<K, V>)
    where
        Fut: Future<Output = FetchOutcome<V>> + Send + 'static,
    {
        let inner = Arc::clone(&guard.inner);

        tokio::spawn(async move {
            let outcome = load.await;

            // 写缓存与移除 in-flight 在同一临界区内完成，之后才通知等待者
            let tx = {
                let mut state = inner.lock();
                if let FetchOutcome::Found(value) = &outcome {
                    if token.is_stale() {
                        tracing::debug!("Discarding superseded load result for {:?}", key);
                    } else {
                        state.insert(key.clone(), value.clone(), Instant::now(), &inner.config);
                    }
                }
                state.in_flight.remove(&key).map(|flight| flight.tx)
            };
            guard.disarm();

            if let Some(tx) = tx {
                tx.send_replace(Some(outcome));
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;
    use crate::error::RemoteError;

    fn cache(capacity: usize) -> ReadThroughCache<&'static str, Arc<String>> {
        ReadThroughCache::new(CacheConfig {
            capacity,
            ttl: Duration::from_secs(60),
        })
    }

    fn value(s: &str) -> Arc<String> {
        Arc::new(s.to_string())
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..1000 {
            if check() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn evicts_least_recently_inserted() {
        let cache = cache(2);
        cache.put("a", value("A"));
        cache.put("b", value("B"));
        cache.put("c", value("C"));

        assert!(cache.get(&"a").is_none());
        assert_eq!(cache.get(&"b").as_deref().map(String::as_str), Some("B"));
        assert_eq!(cache.get(&"c").as_deref().map(String::as_str), Some("C"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn read_refreshes_recency() {
        let cache = cache(2);
        cache.put("a", value("A"));
        cache.put("b", value("B"));
        assert!(cache.get(&"a").is_some());

        cache.put("c", value("C"));

        assert!(cache.get(&"b").is_none());
        assert!(cache.get(&"a").is_some());
        assert!(cache.get(&"c").is_some());
    }

    fn timestamps_tied(cache: &ReadThroughCache<&'static str, Arc<String>>) -> bool {
        let state = cache.inner.lock();
        let mut stamps = state.entries.values().map(|entry| entry.last_accessed);
        let Some(first) = stamps.next() else {
            return true;
        };
        stamps.all(|stamp| stamp == first)
    }

    #[tokio::test(start_paused = true)]
    async fn access_sequence_breaks_eviction_ties() {
        let cache = cache(2);
        cache.put("a", value("A"));
        cache.put("b", value("B"));
        assert!(timestamps_tied(&cache));

        cache.put("c", value("C"));

        assert!(cache.get(&"a").is_none());
        assert!(cache.get(&"b").is_some());
        assert!(cache.get(&"c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn read_refreshes_recency_under_tied_timestamps() {
        let cache = cache(2);
        cache.put("a", value("A"));
        cache.put("b", value("B"));
        assert!(cache.get(&"a").is_some());
        assert!(timestamps_tied(&cache));

        cache.put("c", value("C"));

        assert!(cache.get(&"b").is_none());
        assert!(cache.get(&"a").is_some());
        assert!(cache.get(&"c").is_some());
    }

    #[tokio::test]
    async fn replacing_a_key_does_not_evict() {
        let cache = cache(2);
        cache.put("a", value("A"));
        cache.put("b", value("B"));
        cache.put("a", value("A2"));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a").as_deref().map(String::as_str), Some("A2"));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = cache(8);
        cache.put("a", value("A"));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get(&"a").is_some());

        tokio::time::advance(Duration::from_millis(1001)).await;
        assert!(cache.get(&"a").is_none());
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn insert_sweeps_expired_entries() {
        let cache = cache(8);
        cache.put("a", value("A"));
        cache.put("b", value("B"));

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.put("c", value("C"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().expirations, 2);
    }

    #[tokio::test]
    async fn invalidate_is_idempotent() {
        let cache = cache(2);
        cache.put("a", value("A"));
        cache.invalidate(&"a");
        cache.invalidate(&"a");
        assert!(cache.get(&"a").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_execution() {
        let cache = cache(4);
        let calls = Arc::new(AtomicUsize::new(0));
        let (release, gate) = oneshot::channel::<()>();
        let gate = Arc::new(tokio::sync::Mutex::new(Some(gate)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_load("k", move |_, _| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        if let Some(gate) = gate.lock().await.take() {
                            let _ = gate.await;
                        }
                        FetchOutcome::Found(value("shared"))
                    })
                    .await
            }));
        }

        wait_until(|| cache.stats().loads + cache.stats().joins == 8).await;
        release.send(()).unwrap();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().found().unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|v| Arc::ptr_eq(v, &results[0])));
        assert_eq!(cache.stats().loads, 1);
        assert_eq!(cache.stats().joins, 7);
        assert_eq!(cache.in_flight(), 0);
        assert!(cache.get(&"k").is_some());
    }

    #[tokio::test]
    async fn failure_is_shared_and_not_cached() {
        let cache = cache(4);
        let calls = Arc::new(AtomicUsize::new(0));
        let (release, gate) = oneshot::channel::<()>();

        let leader = {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                cache
                    .get_or_load("k", move |_, _| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let _ = gate.await;
                        FetchOutcome::Permanent(Arc::new(RemoteError::Status(400)))
                    })
                    .await
            })
        };
        wait_until(|| cache.in_flight() == 1).await;

        let joiner = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_load("k", |_, _| async { FetchOutcome::NotFound })
                    .await
            })
        };
        wait_until(|| cache.stats().joins == 1).await;
        release.send(()).unwrap();

        let leader_err = leader.await.unwrap().error().cloned().unwrap();
        let joiner_err = joiner.await.unwrap().error().cloned().unwrap();
        assert!(Arc::ptr_eq(&leader_err, &joiner_err));
        assert!(cache.get(&"k").is_none());

        let retried = cache
            .get_or_load("k", |_, _| async { FetchOutcome::Found(value("fresh")) })
            .await;
        assert!(retried.is_found());
        assert_eq!(cache.stats().loads, 2);
    }

    #[tokio::test]
    async fn not_found_is_not_cached() {
        let cache = cache(4);
        let outcome = cache
            .get_or_load("missing", |_, _| async { FetchOutcome::NotFound })
            .await;
        assert!(matches!(outcome, FetchOutcome::NotFound));
        assert!(cache.get(&"missing").is_none());
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn abandoned_caller_does_not_cancel_load() {
        let cache = cache(4);
        let (release, gate) = oneshot::channel::<()>();

        let caller = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_load("k", move |_, _| async move {
                        let _ = gate.await;
                        FetchOutcome::Found(value("late"))
                    })
                    .await
            })
        };
        wait_until(|| cache.in_flight() == 1).await;

        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());
        release.send(()).unwrap();

        wait_until(|| cache.in_flight() == 0).await;
        assert_eq!(cache.get(&"k").as_deref().map(String::as_str), Some("late"));
    }

    #[tokio::test]
    async fn put_during_load_wins_over_load_result() {
        let cache = cache(4);
        let (release, gate) = oneshot::channel::<()>();
        let seen_stale = Arc::new(AtomicBool::new(false));

        let caller = {
            let cache = cache.clone();
            let seen_stale = Arc::clone(&seen_stale);
            tokio::spawn(async move {
                cache
                    .get_or_load("k", move |_, token| async move {
                        let _ = gate.await;
                        seen_stale.store(token.is_stale(), Ordering::SeqCst);
                        FetchOutcome::Found(value("old"))
                    })
                    .await
            })
        };
        wait_until(|| cache.in_flight() == 1).await;

        cache.put("k", value("new"));
        release.send(()).unwrap();

        let loaded = caller.await.unwrap().found().unwrap();
        assert_eq!(loaded.as_str(), "old");
        assert!(seen_stale.load(Ordering::SeqCst));
        assert_eq!(cache.get(&"k").as_deref().map(String::as_str), Some("new"));
    }

    #[tokio::test]
    async fn invalidate_during_load_keeps_result_out_of_cache() {
        let cache = cache(4);
        let (release, gate) = oneshot::channel::<()>();

        let caller = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_load("k", move |_, _| async move {
                        let _ = gate.await;
                        FetchOutcome::Found(value("gone"))
                    })
                    .await
            })
        };
        wait_until(|| cache.in_flight() == 1).await;

        cache.invalidate(&"k");
        release.send(()).unwrap();

        assert!(caller.await.unwrap().is_found());
        assert_eq!(cache.in_flight(), 0);
        assert!(cache.get(&"k").is_none());
    }

    fn exploding_loader(_: &'static str, _: LoadToken) -> std::future::Ready<FetchOutcome<Arc<String>>> {
        panic!("loader blew up before producing a future")
    }

    #[tokio::test]
    async fn loader_panicking_before_returning_future_releases_key() {
        let cache = cache(4);

        let caller = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_or_load("k", exploding_loader).await })
        };
        assert!(caller.await.unwrap_err().is_panic());
        assert_eq!(cache.in_flight(), 0);

        let retried = cache
            .get_or_load("k", |_, _| async { FetchOutcome::Found(value("fresh")) })
            .await;
        assert!(retried.is_found());
    }

    fn exploding_load() -> FetchOutcome<Arc<String>> {
        panic!("loader blew up")
    }

    #[tokio::test]
    async fn panicking_loader_releases_waiters() {
        let cache = cache(4);
        let outcome = cache
            .get_or_load("k", |_, _| async { exploding_load() })
            .await;

        let err = outcome.error().cloned().unwrap();
        assert!(err.is::<LoadAborted>());
        assert_eq!(cache.in_flight(), 0);
    }
}
