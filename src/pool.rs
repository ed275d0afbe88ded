// src/pool.rs
//! Process-wide cap on simultaneous outbound network calls.
//!
//! One `ConcurrencyBudget` is built from config and cloned into both the search
//! orchestrator and the auditor, so the total in-flight count is observable in one place.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub const DEFAULT_MAX_CONCURRENCY: usize = 20;

#[derive(Clone, Debug)]
pub struct ConcurrencyBudget {
    sem: Arc<Semaphore>,
    limit: usize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// Held for the duration of one network call. Dropping it returns the slot.
#[derive(Debug)]
pub struct Permit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyBudget {
    /// A zero limit is bumped to 1.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            sem: Arc::new(Semaphore::new(limit)),
            limit,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for a free slot.
    ///
    /// The semaphore is never closed, so acquisition only fails if that invariant breaks.
    pub async fn acquire(&self) -> anyhow::Result<Permit> {
        let permit = self
            .sem
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| anyhow::anyhow!("concurrency budget closed"))?;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        Ok(Permit {
            _permit: permit,
            in_flight: self.in_flight.clone(),
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of permits held at once since construction.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Default for ConcurrencyBudget {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_limit() {
        let budget = ConcurrencyBudget::new(3);
        let mut handles = Vec::new();
        for _ in 0..12 {
            let b = budget.clone();
            handles.push(tokio::spawn(async move {
                let _p = b.acquire().await.unwrap();
                tokio::time::sleep(Duration::from_millis(10)).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(budget.peak() <= 3);
        assert!(budget.peak() >= 1);
        assert_eq!(budget.in_flight(), 0);
    }

    #[test]
    fn zero_limit_is_bumped() {
        assert_eq!(ConcurrencyBudget::new(0).limit(), 1);
    }
}
