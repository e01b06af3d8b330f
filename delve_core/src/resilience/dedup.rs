//! Collapses concurrent identical requests into a single in-flight fetch.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use tracing::debug;

type InFlight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

pub struct RequestDeduplicator<T, E>
where
    T: Clone,
    E: Clone,
{
    in_flight: Mutex<HashMap<String, InFlight<T, E>>>,
}

impl<T, E> Default for RequestDeduplicator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> RequestDeduplicator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `fetcher` for `key` unless a fetch for `key` is already running, in
    /// which case wait for that one instead. Every caller gets the same outcome.
    pub async fn execute<F, Fut>(&self, key: &str, fetcher: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let shared = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            match in_flight.get(key) {
                Some(existing) => {
                    debug!(target: "delve.dedup", key, "joining in-flight request");
                    existing.clone()
                }
                None => {
                    let fut = fetcher().boxed().shared();
                    in_flight.insert(key.to_string(), fut.clone());
                    fut
                }
            }
        };

        let result = shared.clone().await;

        // Whoever gets here first clears the entry; later joiners find it gone
        // or replaced by a newer fetch, which they must leave alone.
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if in_flight
            .get(key)
            .is_some_and(|current| current.ptr_eq(&shared))
        {
            in_flight.remove(key);
        }

        result
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let dedup: Arc<RequestDeduplicator<String, String>> = Arc::new(RequestDeduplicator::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let dedup = Arc::clone(&dedup);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    dedup
                        .execute("wikipedia:rust", || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok::<_, String>("result".to_string())
                        })
                        .await
                })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            assert_eq!(task.unwrap().unwrap(), "result");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_errors_are_shared_and_cleared() {
        let dedup: Arc<RequestDeduplicator<String, String>> = Arc::new(RequestDeduplicator::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let run = |dedup: Arc<RequestDeduplicator<String, String>>, calls: Arc<AtomicUsize>| async move {
            dedup
                .execute("k", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Err::<String, _>("boom".to_string())
                })
                .await
        };

        let (a, b) = tokio::join!(
            run(Arc::clone(&dedup), Arc::clone(&calls)),
            run(Arc::clone(&dedup), Arc::clone(&calls))
        );
        assert_eq!(a.unwrap_err(), "boom");
        assert_eq!(b.unwrap_err(), "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.in_flight(), 0);

        // A later call starts a fresh fetch
        let _ = run(Arc::clone(&dedup), Arc::clone(&calls)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_collapse() {
        let dedup: RequestDeduplicator<u32, String> = RequestDeduplicator::new();
        let (a, b) = tokio::join!(
            dedup.execute("a", || async { Ok(1) }),
            dedup.execute("b", || async { Ok(2) })
        );
        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 2);
    }
}
