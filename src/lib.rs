//! # NFT Bidder
//!
//! An async bid automation core for NFT marketplace offers.
//!
//! ## Features
//!
//! - Multi-wallet scheduling under per-wallet sliding-window rate limits
//! - Global action pacing with shared waits and rate-limit pauses
//! - Bounded, self-pruning bid bookkeeping per collection
//! - Submission orchestration with classified conflict/rate-limit retries
//! - Thin, swappable marketplace REST client
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nft_bidder::auth::WalletCredentials;
//! use nft_bidder::ledger::BidLedger;
//! use nft_bidder::market::HttpMarketplaceClient;
//! use nft_bidder::scheduler::{ActionPacer, PoolConfig, WalletPool};
//! use nft_bidder::submit::{RetryConfig, RetryableSubmitter};
//! use tokio::sync::Mutex;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let wallets = vec![WalletCredentials::from_env(
//!         "main",
//!         "BIDDER_SIGNING_KEY",
//!         "BIDDER_PAYOUT_ADDRESS",
//!     )?];
//!     let pool = Arc::new(WalletPool::new(wallets, PoolConfig::default())?);
//!     let pacer = Arc::new(ActionPacer::default());
//!     let ledger = Arc::new(Mutex::new(BidLedger::new()));
//!
//!     let submitter = RetryableSubmitter::new(
//!         HttpMarketplaceClient::new(),
//!         pool,
//!         pacer,
//!         ledger,
//!         RetryConfig::default(),
//!     );
//!     // submitter.submit(&bid).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod error;
pub mod ledger;
pub mod market;
pub mod scheduler;
pub mod submit;

// Re-export commonly used types at crate root
pub use error::BidderError;
pub use ledger::{BidLedger, OfferKind, RecentActionCache};
pub use scheduler::{ActionPacer, WalletPool};
pub use submit::RetryableSubmitter;

/// Result type alias using BidderError
pub type Result<T> = std::result::Result<T, BidderError>;
