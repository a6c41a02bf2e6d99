//! Multi-wallet reservation pool.
//!
//! The pool owns a set of signing wallets, each wrapped with a
//! [`SlidingWindowLimiter`], and hands out at most one reservation at a
//! time under an async-aware mutex. Selection is least-recently-used among
//! wallets with window capacity, and the reservation is committed *before*
//! the critical section ends so two concurrent callers can never pick the
//! same wallet slot.
//!
//! # Example
//!
//! ```rust,no_run
//! use nft_bidder::auth::WalletCredentials;
//! use nft_bidder::scheduler::{PoolConfig, WalletPool};
//!
//! # async fn example() -> Result<(), nft_bidder::BidderError> {
//! let wallets = vec![WalletCredentials::new("main", "a2V5", "payout")?];
//! let pool = WalletPool::new(wallets, PoolConfig::default())?;
//!
//! if let Some(wallet) = pool.reserve().await {
//!     // submit an action with this wallet, then on failure:
//!     pool.rollback(&wallet.action_address).await;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::auth::WalletCredentials;
use crate::error::BidderError;
use crate::scheduler::window::SlidingWindowLimiter;

/// Wallet pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum actions per wallet within one window.
    pub max_actions_per_window: u32,
    /// Rolling window duration.
    pub window: Duration,
    /// How often `wait_until_reserved` re-polls when no wallet is free.
    pub poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_actions_per_window: 5,
            window: Duration::from_secs(60),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Per-wallet state, mutated only under the pool's mutex.
#[derive(Debug)]
struct WalletState {
    credentials: Arc<WalletCredentials>,
    limiter: SlidingWindowLimiter,
    /// Timestamp of the last reservation, for LRU ordering.
    last_action: Option<Instant>,
}

/// A pool of signing wallets with per-wallet rate limiting.
///
/// Thread-safe: share via `Arc<WalletPool>`. Reservation is mutually
/// exclusive across all callers; everything else is total and never fails.
#[derive(Debug)]
pub struct WalletPool {
    wallets: Mutex<Vec<WalletState>>,
    config: PoolConfig,
}

/// Read-only projection of one wallet's state.
#[derive(Debug, Clone)]
pub struct WalletSnapshot {
    /// Wallet label.
    pub label: String,
    /// Action address.
    pub action_address: String,
    /// Actions counted in the current window.
    pub occupancy: u32,
    /// Remaining slots in the current window.
    pub remaining: u32,
    /// Seconds until the next slot frees up; `None` if one is free now.
    pub seconds_until_reset: Option<u64>,
}

/// Read-only projection of the whole pool.
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    /// Number of wallets with at least one free slot.
    pub available: usize,
    /// Total number of wallets.
    pub total: usize,
    /// Per-wallet detail.
    pub wallets: Vec<WalletSnapshot>,
}

impl WalletPool {
    /// Create a pool from pre-validated credentials.
    ///
    /// A pool with zero wallets cannot be built; credential parse failures
    /// already surface from [`WalletCredentials::new`]. Both are fatal at
    /// startup.
    pub fn new(
        credentials: Vec<WalletCredentials>,
        config: PoolConfig,
    ) -> Result<Self, BidderError> {
        if credentials.is_empty() {
            return Err(BidderError::Config(
                "wallet pool requires at least one wallet".to_string(),
            ));
        }

        let wallets = credentials
            .into_iter()
            .map(|creds| WalletState {
                credentials: Arc::new(creds),
                limiter: SlidingWindowLimiter::new(config.window, config.max_actions_per_window),
                last_action: None,
            })
            .collect();

        Ok(Self {
            wallets: Mutex::new(wallets),
            config,
        })
    }

    /// Build a pool directly from `(label, signing_key, payout_address)`
    /// triples, failing on the first unparsable key.
    pub fn from_keys<L, K, P>(
        entries: impl IntoIterator<Item = (L, K, P)>,
        config: PoolConfig,
    ) -> Result<Self, BidderError>
    where
        L: Into<String>,
        K: Into<String>,
        P: Into<String>,
    {
        let credentials = entries
            .into_iter()
            .map(|(label, key, payout)| WalletCredentials::new(label, key, payout))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(credentials, config)
    }

    /// Reserve the least-recently-used available wallet.
    ///
    /// Returns `None` without blocking when every wallet's window is full.
    /// The selected wallet's occupancy and `last_action` are committed
    /// before the lock is released, so a concurrent caller sees the slot
    /// as taken even though the action hasn't happened yet. Callers whose
    /// action fails must hand the slot back via [`WalletPool::rollback`].
    pub async fn reserve(&self) -> Option<Arc<WalletCredentials>> {
        let mut wallets = self.wallets.lock().await;

        let mut chosen: Option<usize> = None;
        for i in 0..wallets.len() {
            if !wallets[i].limiter.would_allow() {
                continue;
            }
            let better = match chosen {
                None => true,
                // Never-used wallets sort oldest; ties keep the earlier index.
                Some(j) => match (wallets[i].last_action, wallets[j].last_action) {
                    (None, Some(_)) => true,
                    (Some(a), Some(b)) => a < b,
                    _ => false,
                },
            };
            if better {
                chosen = Some(i);
            }
        }

        let index = chosen?;
        let wallet = &mut wallets[index];
        wallet.limiter.try_acquire().ok()?;
        wallet.last_action = Some(Instant::now());
        debug!(wallet = %wallet.credentials.label, "reserved wallet slot");
        Some(Arc::clone(&wallet.credentials))
    }

    /// Poll [`WalletPool::reserve`] until a wallet frees up or `max_wait`
    /// elapses. Returns `None` on timeout; never waits forever.
    pub async fn wait_until_reserved(&self, max_wait: Duration) -> Option<Arc<WalletCredentials>> {
        let deadline = Instant::now() + max_wait;
        loop {
            if let Some(wallet) = self.reserve().await {
                return Some(wallet);
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(waited_ms = max_wait.as_millis() as u64, "wallet wait budget exhausted");
                return None;
            }
            let nap = self.config.poll_interval.min(deadline - now);
            tokio::time::sleep(nap).await;
        }
    }

    /// Record one action against a wallet that bypassed pre-reservation.
    ///
    /// After a normal [`WalletPool::reserve`] the slot is already counted
    /// and this must not be called. Unknown addresses are ignored.
    pub async fn confirm(&self, action_address: &str) {
        let mut wallets = self.wallets.lock().await;
        if let Some(wallet) = wallets
            .iter_mut()
            .find(|w| w.credentials.action_address == action_address)
        {
            wallet.limiter.record_unchecked();
            wallet.last_action = Some(Instant::now());
        }
    }

    /// Return a reserved slot after the action failed.
    ///
    /// Occupancy never drops below zero; unknown addresses are ignored.
    pub async fn rollback(&self, action_address: &str) {
        let mut wallets = self.wallets.lock().await;
        if let Some(wallet) = wallets
            .iter_mut()
            .find(|w| w.credentials.action_address == action_address)
        {
            wallet.limiter.rollback();
            debug!(wallet = %wallet.credentials.label, "rolled back wallet reservation");
        }
    }

    /// Produce a read-only snapshot of the pool.
    pub async fn snapshot(&self) -> PoolSnapshot {
        let wallets = self.wallets.lock().await;
        let snapshots: Vec<WalletSnapshot> = wallets
            .iter()
            .map(|w| WalletSnapshot {
                label: w.credentials.label.clone(),
                action_address: w.credentials.action_address.clone(),
                occupancy: w.limiter.occupancy(),
                remaining: w.limiter.remaining(),
                seconds_until_reset: w.limiter.time_until_available().map(|d| d.as_secs()),
            })
            .collect();

        PoolSnapshot {
            available: snapshots.iter().filter(|s| s.remaining > 0).count(),
            total: snapshots.len(),
            wallets: snapshots,
        }
    }

    /// Restart every wallet's window now (administrative/testing).
    pub async fn reset_all(&self) {
        let mut wallets = self.wallets.lock().await;
        for wallet in wallets.iter_mut() {
            wallet.limiter.reset();
        }
    }
}
