//! Global action pacing.
//!
//! The pacer is a single gate over *all* marketplace-mutating actions,
//! independent of which wallet performs them. It combines a fixed window
//! (default 5 actions per 60 seconds) with a pause deadline engaged when
//! the marketplace signals throttling.
//!
//! Construct one [`ActionPacer`] at startup and share it via `Arc`; a
//! second, pacer-independent pause lives in the free functions
//! [`set_global_pause`] / [`is_globally_paused`] / [`remaining_global_pause`]
//! for call sites that detect rate-limit rejections without holding a
//! pacer reference.

use std::sync::Mutex;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::parse_retry_after;

/// Pacer configuration.
#[derive(Debug, Clone)]
pub struct PacerConfig {
    /// Maximum actions per window, across all wallets.
    pub max_actions: u32,
    /// Window duration.
    pub window: Duration,
    /// Pause applied on a rate-limit rejection whose message carries no
    /// recoverable duration.
    pub default_pause: Duration,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            max_actions: 5,
            window: Duration::from_secs(60),
            default_pause: Duration::from_secs(300),
        }
    }
}

struct PacerInner {
    /// Start of the current window, re-anchored on the first action after
    /// a reset.
    window_started: Instant,
    /// Actions counted in the current window.
    count: u32,
    /// Lifetime action count.
    total_actions_placed: u64,
    /// Number of distinct wait episodes (not joiners).
    total_waits: u64,
    /// Pause deadline engaged by rate-limit rejections.
    pause_until: Option<Instant>,
    /// The shared timer all current waiters join.
    slot_wait: Option<Shared<BoxFuture<'static, ()>>>,
}

impl PacerInner {
    /// Reset the window if it has fully elapsed.
    fn maybe_reset(&mut self, now: Instant, window: Duration) {
        if now.duration_since(self.window_started) >= window {
            self.count = 0;
            self.window_started = now;
        }
    }

    fn is_paused(&self, now: Instant) -> bool {
        self.pause_until.is_some_and(|until| until > now)
    }
}

/// Global rate gate for marketplace-mutating actions.
pub struct ActionPacer {
    config: PacerConfig,
    inner: Mutex<PacerInner>,
}

impl std::fmt::Debug for ActionPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionPacer")
            .field("config", &self.config)
            .finish()
    }
}

/// Read-only pacer status for a monitoring surface.
#[derive(Debug, Clone)]
pub struct PacerStatus {
    /// Actions counted in the current window.
    pub used: u32,
    /// Slots left in the current window.
    pub remaining: u32,
    /// Seconds until the current window restarts.
    pub window_reset_in_seconds: u64,
    /// Lifetime action count.
    pub total_actions_placed: u64,
    /// Lifetime count of distinct wait episodes.
    pub total_waits: u64,
    /// Whether a rate-limit pause is currently engaged.
    pub is_paused: bool,
}

impl ActionPacer {
    /// Create a pacer with the given configuration.
    pub fn new(config: PacerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(PacerInner {
                window_started: Instant::now(),
                count: 0,
                total_actions_placed: 0,
                total_waits: 0,
                pause_until: None,
                slot_wait: None,
            }),
        }
    }

    /// Check whether an action may be taken right now.
    ///
    /// Resets an elapsed window as a side effect. Returns `false` while a
    /// rate-limit pause is engaged, regardless of window occupancy.
    pub fn can_act(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        inner.maybe_reset(now, self.config.window);
        !inner.is_paused(now) && inner.count < self.config.max_actions
    }

    /// Count one action against the current window.
    pub fn record_action(&self) {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        inner.maybe_reset(now, self.config.window);
        if inner.count == 0 {
            inner.window_started = now;
        }
        inner.count += 1;
        inner.total_actions_placed += 1;
    }

    /// Wait until an action may be taken.
    ///
    /// Resolves immediately when a slot is free. Otherwise all concurrent
    /// callers join one shared timer (a single wait episode increments
    /// `total_waits` once, however many callers join it). The wake order
    /// of joiners is unspecified.
    pub async fn wait_for_slot(&self) {
        loop {
            let shared = {
                let mut inner = self.inner.lock().unwrap();
                let now = Instant::now();
                inner.maybe_reset(now, self.config.window);

                let paused = inner.is_paused(now);
                if !paused && inner.count < self.config.max_actions {
                    return;
                }

                match &inner.slot_wait {
                    Some(existing) => existing.clone(),
                    None => {
                        let window_rest = if inner.count >= self.config.max_actions {
                            self.config
                                .window
                                .saturating_sub(now.duration_since(inner.window_started))
                        } else {
                            Duration::ZERO
                        };
                        let pause_rest = inner
                            .pause_until
                            .map_or(Duration::ZERO, |until| until.saturating_duration_since(now));
                        let delay = window_rest.max(pause_rest);

                        inner.total_waits += 1;
                        debug!(delay_ms = delay.as_millis() as u64, "pacer wait episode armed");

                        let fut = async move {
                            tokio::time::sleep(delay).await;
                        }
                        .boxed()
                        .shared();
                        inner.slot_wait = Some(fut.clone());
                        fut
                    }
                }
            };

            shared.await;

            // First waker clears the finished timer so the next episode
            // arms a fresh one; an unfinished timer belongs to a newer
            // episode and stays.
            let mut inner = self.inner.lock().unwrap();
            if inner
                .slot_wait
                .as_ref()
                .is_some_and(|fut| fut.peek().is_some())
            {
                inner.slot_wait = None;
            }
        }
    }

    /// React to an upstream rate-limit rejection.
    ///
    /// Forces [`ActionPacer::can_act`] to `false` until the pause lifts.
    /// When the rejection text carries a recoverable duration ("retry in N
    /// minutes"), the pause lasts that long; otherwise the configured
    /// default applies. An existing later deadline is kept.
    pub fn on_rate_limit_error(&self, message: Option<&str>) {
        let pause = message
            .and_then(parse_retry_after)
            .unwrap_or(self.config.default_pause);
        warn!(pause_ms = pause.as_millis() as u64, "rate limited upstream, pausing actions");
        self.pause_for(pause);
    }

    /// Engage a pause of a known duration.
    pub fn pause_for(&self, pause: Duration) {
        let mut inner = self.inner.lock().unwrap();
        let until = Instant::now() + pause;
        inner.pause_until = Some(match inner.pause_until {
            Some(existing) => existing.max(until),
            None => until,
        });
    }

    /// Time left on the engaged pause; zero when not paused.
    pub fn remaining_pause(&self) -> Duration {
        let inner = self.inner.lock().unwrap();
        inner
            .pause_until
            .map_or(Duration::ZERO, |until| until.saturating_duration_since(Instant::now()))
    }

    /// Produce a read-only status snapshot.
    pub fn status(&self) -> PacerStatus {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        inner.maybe_reset(now, self.config.window);

        PacerStatus {
            used: inner.count,
            remaining: self.config.max_actions.saturating_sub(inner.count),
            window_reset_in_seconds: self
                .config
                .window
                .saturating_sub(now.duration_since(inner.window_started))
                .as_secs(),
            total_actions_placed: inner.total_actions_placed,
            total_waits: inner.total_waits,
            is_paused: inner.is_paused(now),
        }
    }

    /// Clear window count and pause state (administrative/testing).
    ///
    /// Lifetime counters are preserved.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.count = 0;
        inner.window_started = Instant::now();
        inner.pause_until = None;
        inner.slot_wait = None;
    }
}

impl Default for ActionPacer {
    fn default() -> Self {
        Self::new(PacerConfig::default())
    }
}

// Process-wide pause, independent of any pacer instance. Rate-limit
// rejections are sometimes detected in code paths that have no pacer
// reference; those call sites use this pair instead.
static GLOBAL_PAUSE: Mutex<Option<Instant>> = Mutex::new(None);

/// Engage the process-wide pause for `duration` from now.
///
/// An existing later deadline is kept.
pub fn set_global_pause(duration: Duration) {
    let mut pause = GLOBAL_PAUSE.lock().unwrap();
    let until = Instant::now() + duration;
    *pause = Some(match *pause {
        Some(existing) => existing.max(until),
        None => until,
    });
}

/// Check whether the process-wide pause is engaged.
pub fn is_globally_paused() -> bool {
    GLOBAL_PAUSE
        .lock()
        .unwrap()
        .is_some_and(|until| until > Instant::now())
}

/// Time left on the process-wide pause; zero when not paused.
pub fn remaining_global_pause() -> Duration {
    GLOBAL_PAUSE
        .lock()
        .unwrap()
        .map_or(Duration::ZERO, |until| until.saturating_duration_since(Instant::now()))
}

/// Lift the process-wide pause (administrative/testing).
pub fn clear_global_pause() {
    *GLOBAL_PAUSE.lock().unwrap() = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_can_act_within_limit() {
        let pacer = ActionPacer::default();

        for _ in 0..5 {
            assert!(pacer.can_act());
            pacer.record_action();
        }
        assert!(!pacer.can_act());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_auto_resets() {
        let pacer = ActionPacer::default();

        for _ in 0..5 {
            pacer.record_action();
        }
        assert!(!pacer.can_act());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(pacer.can_act());
        assert_eq!(pacer.status().used, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_slot_immediate_when_free() {
        let pacer = ActionPacer::default();
        pacer.wait_for_slot().await;
        assert_eq!(pacer.status().total_waits, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_wait_counts_one_episode() {
        let pacer = std::sync::Arc::new(ActionPacer::default());

        for _ in 0..5 {
            pacer.record_action();
        }

        // Two concurrent waiters join one episode and both resolve after
        // a single window.
        let started = Instant::now();
        tokio::join!(pacer.wait_for_slot(), pacer.wait_for_slot());

        assert_eq!(started.elapsed(), Duration::from_secs(60));
        assert_eq!(pacer.status().total_waits, 1);
        assert!(pacer.can_act());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_pause_overrides_window() {
        let pacer = ActionPacer::default();
        assert!(pacer.can_act());

        pacer.on_rate_limit_error(None);
        assert!(!pacer.can_act());
        assert!(pacer.status().is_paused);

        // Default pause is 5 minutes.
        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(pacer.can_act());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_pause_parses_message() {
        let pacer = ActionPacer::default();
        pacer.on_rate_limit_error(Some("too many requests, retry in 2 minutes"));

        let remaining = pacer.remaining_pause();
        assert_eq!(remaining, Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_slot_honors_pause() {
        let pacer = std::sync::Arc::new(ActionPacer::default());
        pacer.pause_for(Duration::from_secs(30));

        let started = Instant::now();
        pacer.wait_for_slot().await;
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_window_and_pause() {
        let pacer = ActionPacer::default();
        for _ in 0..5 {
            pacer.record_action();
        }
        pacer.on_rate_limit_error(None);

        pacer.reset();
        assert!(pacer.can_act());
        assert_eq!(pacer.status().used, 0);
        assert!(!pacer.status().is_paused);
        // Lifetime counters survive the reset.
        assert_eq!(pacer.status().total_actions_placed, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_pause_lifecycle() {
        clear_global_pause();
        assert!(!is_globally_paused());

        set_global_pause(Duration::from_secs(10));
        assert!(is_globally_paused());
        assert!(remaining_global_pause() > Duration::ZERO);

        clear_global_pause();
        assert!(!is_globally_paused());
        assert_eq!(remaining_global_pause(), Duration::ZERO);
    }
}
