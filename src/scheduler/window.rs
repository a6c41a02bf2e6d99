//! Sliding-window action limiting.
//!
//! Each wallet gets its own limiter tracking action timestamps within a
//! rolling window. Availability is a pure function of the window's current
//! occupancy.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use nft_bidder::scheduler::SlidingWindowLimiter;
//!
//! let mut limiter = SlidingWindowLimiter::new(
//!     Duration::from_secs(60), // Window size
//!     5,                       // Max actions per window
//! );
//!
//! assert!(limiter.try_acquire().is_ok());
//! ```

use std::time::Duration;

use tokio::time::Instant;

/// A sliding window rate limiter.
///
/// Tracks action timestamps within a rolling window and enforces a maximum
/// number of actions within that window. Unlike a fixed window, a slot
/// frees up exactly when the oldest counted action ages out.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    /// Action timestamps
    actions: Vec<Instant>,
    /// Window duration
    window: Duration,
    /// Maximum actions per window
    max_actions: u32,
}

impl SlidingWindowLimiter {
    /// Create a new sliding window limiter.
    pub fn new(window: Duration, max_actions: u32) -> Self {
        Self {
            actions: Vec::with_capacity(max_actions as usize),
            window,
            max_actions,
        }
    }

    /// Try to acquire an action slot.
    ///
    /// Returns `Ok(())` if allowed, `Err(wait_time)` if the window is full.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.cleanup_old();

        if (self.actions.len() as u32) < self.max_actions {
            self.actions.push(Instant::now());
            Ok(())
        } else {
            // Find when the oldest action will expire.
            let wait_time = self
                .actions
                .first()
                .map(|oldest| self.window.saturating_sub(oldest.elapsed()))
                .unwrap_or_default();
            Err(wait_time)
        }
    }

    /// Record an action without checking availability.
    ///
    /// Used by callers that acted without pre-reserving a slot; the window
    /// can temporarily exceed its limit as a result.
    pub fn record_unchecked(&mut self) {
        self.cleanup_old();
        self.actions.push(Instant::now());
    }

    /// Return one acquired slot, most recent first.
    ///
    /// Occupancy never goes below zero; returning a slot on an empty window
    /// is a no-op. Called when a reserved slot's action ultimately failed.
    pub fn rollback(&mut self) {
        self.cleanup_old();
        self.actions.pop();
    }

    /// Check if an action would be allowed without consuming a slot.
    pub fn would_allow(&self) -> bool {
        self.occupancy() < self.max_actions
    }

    /// Get the number of actions counted in the current window.
    pub fn occupancy(&self) -> u32 {
        self.actions
            .iter()
            .filter(|ts| ts.elapsed() < self.window)
            .count() as u32
    }

    /// Get the number of remaining slots.
    pub fn remaining(&self) -> u32 {
        self.max_actions.saturating_sub(self.occupancy())
    }

    /// Get the time until the next slot is available.
    ///
    /// Returns `None` if a slot is available now.
    pub fn time_until_available(&self) -> Option<Duration> {
        if self.would_allow() {
            None
        } else {
            // Oldest action still inside the window
            self.actions
                .iter()
                .find(|ts| ts.elapsed() < self.window)
                .map(|oldest| self.window.saturating_sub(oldest.elapsed()))
        }
    }

    /// Check if the window has no active actions.
    pub fn is_empty(&self) -> bool {
        self.actions.iter().all(|ts| ts.elapsed() >= self.window)
    }

    /// Restart the window now, forgetting all counted actions.
    pub fn reset(&mut self) {
        self.actions.clear();
    }

    /// Remove actions that are outside the window.
    fn cleanup_old(&mut self) {
        let window = self.window;
        self.actions.retain(|ts| ts.elapsed() < window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_allows_within_limit() {
        let mut limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 3);

        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_frees_exactly_after_window() {
        let mut limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 2);

        limiter.try_acquire().unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        limiter.try_acquire().unwrap();
        assert!(!limiter.would_allow());

        // 59s after the oldest action: still full
        tokio::time::advance(Duration::from_secs(49)).await;
        assert!(!limiter.would_allow());

        // 60s after the oldest action: exactly one slot frees
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.would_allow());
        assert_eq!(limiter.occupancy(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_time_points_at_oldest() {
        let mut limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 1);

        limiter.try_acquire().unwrap();
        tokio::time::advance(Duration::from_secs(15)).await;

        let wait = limiter.try_acquire().unwrap_err();
        assert_eq!(wait, Duration::from_secs(45));
        assert_eq!(limiter.time_until_available(), Some(Duration::from_secs(45)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_restores_slot() {
        let mut limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 2);

        limiter.try_acquire().unwrap();
        assert_eq!(limiter.occupancy(), 1);

        limiter.rollback();
        assert_eq!(limiter.occupancy(), 0);

        // Never below zero
        limiter.rollback();
        assert_eq!(limiter.occupancy(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_unchecked_can_exceed_limit() {
        let mut limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 1);

        limiter.try_acquire().unwrap();
        limiter.record_unchecked();
        assert_eq!(limiter.occupancy(), 2);
        assert_eq!(limiter.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset() {
        let mut limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 2);

        limiter.try_acquire().unwrap();
        limiter.try_acquire().unwrap();
        limiter.reset();

        assert!(limiter.is_empty());
        assert_eq!(limiter.remaining(), 2);
    }
}
