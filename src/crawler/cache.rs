//! Run-scoped response cache with single-flight arbitration
//!
//! The cache maps a normalized request key to the last successful raw body
//! for that key. Entries live as long as the cache, which is owned by one run;
//! nothing is ever evicted or invalidated.
//!
//! When several tasks ask for the same key at once, the first one becomes the
//! leader and runs the fetch; the others wait on the leader's outcome instead
//! of racing their own relay calls. Failures are shared with the waiters but
//! never stored, so a later request for the same key fetches again.

use crate::url::cache_key;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

type Outcome = Option<Arc<str>>;

#[derive(Debug)]
enum Slot {
    Ready(Arc<str>),
    InFlight(watch::Receiver<Option<Outcome>>),
}

/// In-memory response cache shared by all fetch tasks of one run
#[derive(Debug, Default)]
pub struct ResponseCache {
    slots: Mutex<HashMap<String, Slot>>,
}

enum Role {
    Hit(Arc<str>),
    Wait(watch::Receiver<Option<Outcome>>),
    Lead(watch::Sender<Option<Outcome>>),
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached body for `url`, if a fetch of it already succeeded
    pub fn get(&self, url: &str) -> Option<Arc<str>> {
        match self.slots().get(&cache_key(url)) {
            Some(Slot::Ready(body)) => Some(body.clone()),
            _ => None,
        }
    }

    /// Stores a successful body for `url`
    #[cfg(test)]
    pub fn insert(&self, url: &str, body: impl Into<Arc<str>>) {
        self.slots().insert(cache_key(url), Slot::Ready(body.into()));
    }

    /// Number of cached bodies
    pub fn len(&self) -> usize {
        self.slots()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cached body for `url`, or runs `fetch` to produce it
    ///
    /// At most one `fetch` per key is in flight. Concurrent callers for the
    /// same key await the leader's result. If the leader is dropped before
    /// finishing, one of the waiters takes over.
    pub async fn get_or_fetch<F, Fut>(&self, url: &str, fetch: F) -> Option<Arc<str>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<String>>,
    {
        let key = cache_key(url);
        let mut fetch = Some(fetch);

        loop {
            let role = {
                let mut slots = self.slots();
                match slots.get(&key) {
                    Some(Slot::Ready(body)) => Role::Hit(body.clone()),
                    Some(Slot::InFlight(rx)) => Role::Wait(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        slots.insert(key.clone(), Slot::InFlight(rx));
                        Role::Lead(tx)
                    }
                }
            };

            match role {
                Role::Hit(body) => {
                    tracing::debug!("Cache hit for {}", key);
                    return Some(body);
                }
                Role::Wait(mut rx) => {
                    tracing::debug!("Awaiting in-flight fetch of {}", key);
                    // An Err means the leader was dropped; loop to take over
                    if let Ok(outcome) = rx.wait_for(Option::is_some).await {
                        return outcome.clone().flatten();
                    }
                }
                Role::Lead(tx) => {
                    let fetch = match fetch.take() {
                        Some(fetch) => fetch,
                        None => return None,
                    };
                    let guard = LeaderGuard {
                        cache: self,
                        key: &key,
                        armed: true,
                    };
                    let outcome: Outcome = fetch().await.map(Arc::from);
                    guard.finish(&outcome);
                    let _ = tx.send(Some(outcome.clone()));
                    return outcome;
                }
            }
        }
    }
}

/// Clears the in-flight slot if the leader's future is dropped mid-fetch
struct LeaderGuard<'a> {
    cache: &'a ResponseCache,
    key: &'a str,
    armed: bool,
}

impl LeaderGuard<'_> {
    fn finish(mut self, outcome: &Outcome) {
        let mut slots = self.cache.slots();
        match outcome {
            Some(body) => {
                slots.insert(self.key.to_string(), Slot::Ready(body.clone()));
            }
            None => {
                slots.remove(self.key);
            }
        }
        self.armed = false;
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cache.slots().remove(self.key);
        }
    }
}
