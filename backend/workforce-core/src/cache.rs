// src/cache.rs
//! In-memory TTL cache with stale-on-error fallback and in-flight deduplication.
//!
//! Refreshes run on their own task, so a refresh started by a caller that later
//! goes away still completes and fills the cache for the next caller.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::UpstreamError;

type FetchResult<V> = Result<V, UpstreamError>;
type PendingFetch<V> = Shared<BoxFuture<'static, FetchResult<V>>>;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_stale(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= self.ttl
    }
}

struct CacheState<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    in_flight: HashMap<K, PendingFetch<V>>,
}

impl<K: Eq + Hash + Clone, V> CacheState<K, V> {
    /// Drops expired entries first, then the oldest, until at most `max` remain.
    fn prune(&mut self, max: usize, now: Instant) {
        if self.entries.len() <= max {
            return;
        }
        self.entries.retain(|_, entry| !entry.is_stale(now));
        while self.entries.len() > max {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

pub struct TtlCache<K, V> {
    name: &'static str,
    max_entries: Option<usize>,
    state: Arc<Mutex<CacheState<K, V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            max_entries: None,
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
            })),
        }
    }

    pub fn bounded(name: &'static str, max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries),
            ..Self::new(name)
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached value if fresh, otherwise fetches it.
    ///
    /// Concurrent callers for the same key share one fetch. If the fetch fails
    /// and any earlier value exists it is returned instead of the error.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, ttl: Duration, fetch: F) -> FetchResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult<V>> + Send + 'static,
    {
        let pending = {
            let mut state = self.lock();
            if let Some(entry) = state.entries.get(&key) {
                if !entry.is_stale(Instant::now()) {
                    debug!("Cache hit for {} '{}'", self.name, key);
                    return Ok(entry.value.clone());
                }
            }
            match state.in_flight.get(&key) {
                Some(pending) => {
                    debug!("Joining in-flight refresh of {} '{}'", self.name, key);
                    pending.clone()
                }
                None => {
                    debug!("Cache miss for {} '{}', fetching", self.name, key);
                    let pending = self.spawn_refresh(key.clone(), ttl, fetch());
                    state.in_flight.insert(key.clone(), pending.clone());
                    pending
                }
            }
        };

        match pending.await {
            Ok(value) => Ok(value),
            Err(err) => match self.lock().entries.get(&key) {
                Some(entry) => {
                    warn!(
                        "Refreshing {} '{}' failed, serving stale data: {}",
                        self.name, key, err
                    );
                    Ok(entry.value.clone())
                }
                None => Err(err),
            },
        }
    }

    fn spawn_refresh<Fut>(&self, key: K, ttl: Duration, fetch: Fut) -> PendingFetch<V>
    where
        Fut: Future<Output = FetchResult<V>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let max_entries = self.max_entries;
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = fetch.await;
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            if let Ok(value) = &result {
                let now = Instant::now();
                guard.entries.insert(
                    task_key.clone(),
                    CacheEntry {
                        value: value.clone(),
                        stored_at: now,
                        ttl,
                    },
                );
                if let Some(max) = max_entries {
                    guard.prune(max, now);
                }
            }
            // Entry first, then the in-flight marker, under one lock.
            guard.in_flight.remove(&task_key);
            result
        });

        let state = Arc::clone(&self.state);
        handle
            .map(move |joined| match joined {
                Ok(result) => result,
                Err(join_err) => {
                    warn!("Refresh task for '{}' did not finish: {}", key, join_err);
                    state
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .in_flight
                        .remove(&key);
                    Err(UpstreamError::Aborted {
                        key: key.to_string(),
                    })
                }
            })
            .boxed()
            .shared()
    }

    /// The cached value regardless of age.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.lock().entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();
        let mut state = self.lock();
        state.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                ttl,
            },
        );
        if let Some(max) = self.max_entries {
            state.prune(max, now);
        }
    }

    pub fn invalidate(&self, key: &K) {
        self.lock().entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
