//! Bounded polling for SPA support
//!
//! Maps renders most of the place page via JavaScript after the load event
//! fires, so controls have to be polled for rather than queried once.

use std::time::Duration;

use tokio::time::Instant;

/// Exponential backoff between polls, bounded by an overall deadline
///
/// # Polling Strategy
/// - Starts at 100ms intervals
/// - Doubles each retry (exponential backoff)
/// - Caps at 1 second maximum interval
/// - Never sleeps past the deadline
#[derive(Debug)]
pub struct Backoff {
    deadline: Instant,
    interval: Duration,
    max_interval: Duration,
}

impl Backoff {
    pub fn new(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(1),
        }
    }

    /// Time left before the deadline
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Sleep until the next poll; `false` once the deadline has passed
    pub async fn wait(&mut self) -> bool {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return false;
        }
        tokio::time::sleep(self.interval.min(remaining)).await;
        self.interval = (self.interval * 2).min(self.max_interval);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn intervals_double_up_to_cap() {
        let mut backoff = Backoff::new(Duration::from_secs(60));
        let mut slept = Vec::new();
        for _ in 0..6 {
            let before = Instant::now();
            assert!(backoff.wait().await);
            slept.push(before.elapsed().as_millis());
        }
        assert_eq!(slept, [100, 200, 400, 800, 1000, 1000]);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_deadline() {
        let start = Instant::now();
        let mut backoff = Backoff::new(Duration::from_millis(650));
        let mut polls = 0;
        while backoff.wait().await {
            polls += 1;
        }
        // 100 + 200 + 350 (clipped)
        assert_eq!(polls, 3);
        assert_eq!(start.elapsed(), Duration::from_millis(650));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_never_waits() {
        let mut backoff = Backoff::new(Duration::ZERO);
        assert!(!backoff.wait().await);
    }
}
