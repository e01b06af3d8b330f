//! Bounded background refresh for stale cache entries.
//!
//! Refresh jobs go through a fixed-capacity queue drained by a fixed number of
//! worker tasks. A key already queued or running is not queued again, and jobs
//! arriving while the queue is full are dropped: the stale value keeps being
//! served until a later request schedules a refresh that fits.

use futures::future::BoxFuture;
use futures::FutureExt;
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

struct RefreshJob {
    key: String,
    task: BoxFuture<'static, ()>,
}

pub struct Revalidator {
    workers: usize,
    capacity: usize,
    sender: OnceCell<mpsc::Sender<RefreshJob>>,
    pending: Arc<Mutex<HashSet<String>>>,
}

impl Revalidator {
    pub fn new(workers: usize, capacity: usize) -> Self {
        Self {
            workers: workers.max(1),
            capacity: capacity.max(1),
            sender: OnceCell::new(),
            pending: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Queue `task` as the refresh for `key`. Returns `false` when a refresh for
    /// `key` is already pending or the queue is full.
    ///
    /// Must be called from within a tokio runtime; workers start on first use.
    pub fn schedule<F>(&self, key: &str, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            if !pending.insert(key.to_string()) {
                debug!(target: "delve.revalidate", key, "refresh already pending");
                return false;
            }
        }

        let job = RefreshJob {
            key: key.to_string(),
            task: task.boxed(),
        };
        match self.sender().try_send(job) {
            Ok(()) => true,
            Err(err) => {
                debug!(target: "delve.revalidate", key, error = %err, "refresh dropped");
                self.pending
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(key);
                false
            }
        }
    }

    /// Keys queued or currently refreshing.
    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn sender(&self) -> &mpsc::Sender<RefreshJob> {
        self.sender.get_or_init(|| {
            let (tx, rx) = mpsc::channel::<RefreshJob>(self.capacity);
            let rx = Arc::new(tokio::sync::Mutex::new(rx));
            for worker in 0..self.workers {
                let rx = Arc::clone(&rx);
                let pending = Arc::clone(&self.pending);
                tokio::spawn(async move {
                    loop {
                        let job = { rx.lock().await.recv().await };
                        let Some(job) = job else { break };
                        debug!(target: "delve.revalidate", worker, key = %job.key, "refreshing");
                        job.task.await;
                        pending
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .remove(&job.key);
                    }
                });
            }
            tx
        })
    }
}
