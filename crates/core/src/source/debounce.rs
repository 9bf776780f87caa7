//! Trailing-edge debouncing of async lookups.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lets only the last call of a burst run.
///
/// Each call takes a new generation and waits out the delay. If another call
/// arrived in the meantime the earlier one is dropped. A finished lookup is
/// also dropped when a newer one has already published its result.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    issued: AtomicU64,
    published: AtomicU64,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            issued: AtomicU64::new(0),
            published: AtomicU64::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// `None` when the call was superseded.
    pub async fn run<F, Fut, T>(&self, lookup: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if self.issued.load(Ordering::SeqCst) != generation {
            return None;
        }

        let result = lookup().await;
        let newest = self.published.fetch_max(generation, Ordering::SeqCst);
        (newest < generation).then_some(result)
    }
}
