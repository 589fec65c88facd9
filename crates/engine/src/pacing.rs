//! Spacing of consecutive remote calls.
//!
//! Aggregations touch one partition per year. The remote host throttles bursts,
//! so the engine asks a [`Pacer`] for a slot before each per-year call. The
//! policy lives here, away from the aggregation logic, and is swappable.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

#[async_trait]
pub trait Pacer: Send + Sync {
    /// Resolves when the caller may issue its next remote call.
    async fn wait(&self);
}

/// Hands out slots at least `interval` apart.
///
/// The first slot is immediate. A pacer shared by concurrent queries spaces
/// their calls too.
pub struct FixedIntervalPacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl FixedIntervalPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl Pacer for FixedIntervalPacer {
    async fn wait(&self) {
        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next_slot.map_or(now, |next| next.max(now));
            *next_slot = Some(slot + self.interval);
            slot
        };
        sleep_until(slot).await;
    }
}

/// Never waits.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPacing;

#[async_trait]
impl Pacer for NoPacing {
    async fn wait(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn first_slot_is_immediate_and_later_ones_are_spaced() {
        let pacer = FixedIntervalPacer::from_millis(500);
        let start = Instant::now();

        pacer.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        pacer.wait().await;
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert!(start.elapsed() < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_counts_towards_the_interval() {
        let pacer = FixedIntervalPacer::from_millis(500);
        pacer.wait().await;
        tokio::time::sleep(Duration::from_millis(800)).await;

        let before = Instant::now();
        pacer.wait().await;
        assert!(before.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_waiters_get_distinct_slots() {
        let pacer = Arc::new(FixedIntervalPacer::from_millis(100));
        let start = Instant::now();

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let pacer = pacer.clone();
                tokio::spawn(async move {
                    pacer.wait().await;
                    Instant::now()
                })
            })
            .collect();
        let mut finished = Vec::new();
        for waiter in waiters {
            finished.push(waiter.await.unwrap() - start);
        }
        finished.sort();

        assert!(finished[0] < Duration::from_millis(10));
        assert!(finished[1] >= Duration::from_millis(100));
        assert!(finished[2] >= Duration::from_millis(200));
        assert!(finished[2] < Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn no_pacing_never_sleeps() {
        let start = Instant::now();
        for _ in 0..5 {
            NoPacing.wait().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
