//! Bid admission and scheduling.
//!
//! Two independent gates stand between the strategy and the marketplace:
//!
//! - **Per-wallet limits**: the [`WalletPool`] owns every signing wallet
//!   and hands out at most [`PoolConfig::max_actions_per_window`] slots
//!   per wallet per window, selecting least-recently-used first.
//! - **Global pacing**: the [`ActionPacer`] caps total actions per window
//!   across all wallets and holds the longer-lived pause engaged by
//!   upstream rate-limit rejections.
//!
//! A reservation taken from the pool is optimistic: the slot is committed
//! before the action runs, and [`WalletPool::rollback`] hands it back if
//! the action fails. This keeps the check-then-act sequence safe without
//! holding a lock across I/O.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nft_bidder::auth::WalletCredentials;
//! use nft_bidder::scheduler::{ActionPacer, PoolConfig, WalletPool};
//!
//! # async fn example() -> Result<(), nft_bidder::BidderError> {
//! let wallets = vec![WalletCredentials::new("main", "a2V5", "payout")?];
//! let pool = Arc::new(WalletPool::new(wallets, PoolConfig::default())?);
//! let pacer = Arc::new(ActionPacer::default());
//!
//! pacer.wait_for_slot().await;
//! if let Some(wallet) = pool.reserve().await {
//!     // submit the action, then pacer.record_action() on success
//!     // or pool.rollback(&wallet.action_address) on failure
//! }
//! # Ok(())
//! # }
//! ```

mod pacer;
mod pool;
mod window;

pub use pacer::{
    ActionPacer, PacerConfig, PacerStatus, clear_global_pause, is_globally_paused,
    remaining_global_pause, set_global_pause,
};
pub use pool::{PoolConfig, PoolSnapshot, WalletPool, WalletSnapshot};
pub use window::SlidingWindowLimiter;
