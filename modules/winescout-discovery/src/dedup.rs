use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use futures::future::{FutureExt, Shared};
use tracing::debug;

type SharedOutcome<T> = Shared<Pin<Box<dyn Future<Output = T> + Send>>>;

/// Coalesces identical concurrent operations into one in-flight future.
///
/// The first caller for a key runs the operation; concurrent callers with the
/// same key await the same future and observe the same outcome. The key
/// leaves the in-flight table once the operation settles, so later calls run
/// fresh. Keys must incorporate every semantically relevant parameter (query
/// text, domain list, locale) so unrelated operations never collide.
pub struct Deduplicator<T: Clone> {
    inflight: Mutex<HashMap<String, SharedOutcome<T>>>,
}

impl<T: Clone + Send + Sync + 'static> Default for Deduplicator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> Deduplicator<T> {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `make()` under `key`, or join the identical operation already in
    /// flight. Failures must be encoded in `T`: every joined caller sees the
    /// same value, success or not.
    pub async fn run<F, Fut>(&self, key: &str, make: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (shared, leader) = {
            let mut inflight = self.inflight.lock().unwrap();
            match inflight.get(key) {
                Some(existing) => {
                    debug!(key, "Joining in-flight operation");
                    (existing.clone(), false)
                }
                None => {
                    let fut: Pin<Box<dyn Future<Output = T> + Send>> = Box::pin(make());
                    let shared = fut.shared();
                    inflight.insert(key.to_string(), shared.clone());
                    (shared, true)
                }
            }
        };

        let outcome = shared.await;

        if leader {
            self.inflight.lock().unwrap().remove(key);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn identical_keys_run_once() {
        let dedup = Arc::new(Deduplicator::new());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let dedup = dedup.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                dedup
                    .run("same-key", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        42u32
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_run_independently() {
        let dedup = Arc::new(Deduplicator::new());
        let calls = Arc::new(AtomicU32::new(0));

        let a = {
            let calls = calls.clone();
            dedup.run("key-a", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                "a"
            })
        };
        let b = {
            let calls = calls.clone();
            dedup.run("key-b", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                "b"
            })
        };

        let (a, b) = tokio::join!(a, b);
        assert_eq!((a, b), ("a", "b"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn key_is_released_after_settle() {
        let dedup = Deduplicator::new();
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            dedup
                .run("key", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }

        // Sequential calls are distinct operations.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn joined_callers_share_failure_outcomes() {
        let dedup = Arc::new(Deduplicator::new());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let dedup = dedup.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                dedup
                    .run("failing", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Result::<u32, String>::Err("upstream 503".into())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Err("upstream 503".to_string()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
