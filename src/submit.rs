//! Bid submission with classified retries.
//!
//! [`RetryableSubmitter`] ties the scheduler together: it reserves a
//! wallet slot, passes the global pacer gate, places the bid through the
//! marketplace seam, and reacts to the two recoverable error classes:
//! conflicts (cancel the conflicting bid and retry, bounded by
//! [`RetryConfig::max_retries`]) and rate limits (engage the pacer's
//! pause and retry after it lifts, on a separate budget). Anything else
//! propagates unchanged after the wallet reservation is rolled back.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::auth::WalletCredentials;
use crate::error::BidderError;
use crate::ledger::{BidLedger, OfferKind};
use crate::market::{BidReceipt, MarketplaceApi, PlaceBidRequest};
use crate::scheduler::{ActionPacer, WalletPool, is_globally_paused, remaining_global_pause};

/// Retry policy for bid submission.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Conflict-retry budget: how many times a conflicting remote bid may
    /// be cancelled and the placement retried.
    pub max_retries: u32,
    /// Base backoff delay; attempt `n` waits `base_delay * 2^(n-1)`.
    pub base_delay: Duration,
    /// Separate ceiling for rate-limit retries, so repeated throttling
    /// cannot spin forever without ever touching the conflict budget.
    pub max_rate_limit_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(2500),
            max_rate_limit_retries: 10,
        }
    }
}

impl RetryConfig {
    /// Backoff delay for the given attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        self.base_delay * 2u32.saturating_pow(exponent)
    }
}

/// One bid the strategy wants placed.
#[derive(Debug, Clone)]
pub struct BidSubmission {
    /// Collection slug.
    pub collection: String,
    /// Target identifier.
    pub target: String,
    /// Offer kind.
    pub kind: OfferKind,
    /// Offered price.
    pub price: Decimal,
    /// When the bid should expire.
    pub expiry: OffsetDateTime,
}

/// Orchestrates wallet reservation, pacing, and classified retries around
/// marketplace submission.
///
/// Shared state is injected: one pool, one pacer, one ledger per process,
/// passed by `Arc`.
pub struct RetryableSubmitter<M> {
    api: M,
    pool: Arc<WalletPool>,
    pacer: Arc<ActionPacer>,
    ledger: Arc<Mutex<BidLedger>>,
    retry: RetryConfig,
    /// How long `submit` may wait for a wallet slot.
    wallet_wait: Duration,
}

impl<M: MarketplaceApi> RetryableSubmitter<M> {
    /// Create a submitter over the given marketplace implementation.
    pub fn new(
        api: M,
        pool: Arc<WalletPool>,
        pacer: Arc<ActionPacer>,
        ledger: Arc<Mutex<BidLedger>>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            api,
            pool,
            pacer,
            ledger,
            retry,
            wallet_wait: Duration::from_secs(30),
        }
    }

    /// Set the maximum time `submit` waits for a wallet slot.
    pub fn with_wallet_wait(mut self, wallet_wait: Duration) -> Self {
        self.wallet_wait = wallet_wait;
        self
    }

    /// Get a reference to the inner marketplace implementation.
    pub fn api(&self) -> &M {
        &self.api
    }

    /// Place a bid, recovering from conflicts and rate limits.
    ///
    /// A reserved wallet slot is always returned to the pool when the
    /// submission ultimately fails, whatever the failure class.
    pub async fn submit(&self, submission: &BidSubmission) -> Result<BidReceipt, BidderError> {
        let Some(wallet) = self.pool.wait_until_reserved(self.wallet_wait).await else {
            return Err(BidderError::WalletUnavailable {
                waited_ms: self.wallet_wait.as_millis() as u64,
            });
        };

        match self.submit_with_wallet(&wallet, submission).await {
            Ok(receipt) => Ok(receipt),
            Err(error) => {
                self.pool.rollback(&wallet.action_address).await;
                Err(error)
            }
        }
    }

    async fn submit_with_wallet(
        &self,
        wallet: &WalletCredentials,
        submission: &BidSubmission,
    ) -> Result<BidReceipt, BidderError> {
        let request = PlaceBidRequest {
            collection: submission.collection.clone(),
            target: submission.target.clone(),
            kind: submission.kind,
            price: submission.price,
            expiry: submission.expiry,
            payout_address: wallet.payout_address.clone(),
        };

        let mut conflict_attempts = 0u32;
        let mut rate_limit_retries = 0u32;

        loop {
            // A pause engaged outside the pacer's call path still gates us.
            while is_globally_paused() {
                tokio::time::sleep(remaining_global_pause()).await;
            }
            self.pacer.wait_for_slot().await;

            match self.api.place_bid(wallet, &request).await {
                Ok(receipt) => {
                    self.pacer.record_action();
                    let mut ledger = self.ledger.lock().await;
                    ledger.set_offer_kind(&submission.collection, submission.kind);
                    ledger.upsert_bid(
                        &submission.collection,
                        &submission.target,
                        receipt.price,
                        receipt.expiry,
                        &wallet.action_address,
                    );
                    return Ok(receipt);
                }

                Err(error) if is_rate_limit(&error) => {
                    rate_limit_retries += 1;
                    if rate_limit_retries > self.retry.max_rate_limit_retries {
                        return Err(BidderError::SubmissionFailed {
                            attempts: conflict_attempts + rate_limit_retries,
                            reason: error.to_string(),
                        });
                    }
                    self.engage_pause(&error);
                    let pause = self.pacer.remaining_pause();
                    warn!(
                        target_id = %submission.target,
                        pause_ms = pause.as_millis() as u64,
                        "rate limited, retrying after pause"
                    );
                    tokio::time::sleep(pause).await;
                }

                Err(error) if is_conflict(&error) => {
                    conflict_attempts += 1;
                    if conflict_attempts > self.retry.max_retries {
                        return Err(BidderError::SubmissionFailed {
                            attempts: conflict_attempts + rate_limit_retries,
                            reason: error.to_string(),
                        });
                    }
                    let delay = self.retry.delay_for(conflict_attempts);
                    debug!(
                        target_id = %submission.target,
                        attempt = conflict_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "conflicting remote bid, cancelling and retrying"
                    );
                    tokio::time::sleep(delay).await;

                    if let Some(existing) =
                        self.api.open_bid_for(wallet, &submission.target).await?
                    {
                        self.api.cancel_bid(wallet, &existing.bid_id).await?;
                        self.ledger
                            .lock()
                            .await
                            .remove_bid(&submission.collection, &submission.target);
                    }
                }

                Err(error) => return Err(error),
            }
        }
    }

    fn engage_pause(&self, error: &BidderError) {
        match error {
            BidderError::RateLimited {
                retry_after_ms: Some(ms),
            } => self.pacer.pause_for(Duration::from_millis(*ms)),
            BidderError::Api(api) => self.pacer.on_rate_limit_error(Some(&api.message)),
            _ => self.pacer.on_rate_limit_error(None),
        }
    }
}

fn is_rate_limit(error: &BidderError) -> bool {
    match error {
        BidderError::RateLimited { .. } => true,
        BidderError::Api(api) => api.is_rate_limited(),
        _ => false,
    }
}

fn is_conflict(error: &BidderError) -> bool {
    match error {
        BidderError::Api(api) => api.is_duplicate_bid(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn test_backoff_sequence() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(1), Duration::from_millis(2500));
        assert_eq!(config.delay_for(2), Duration::from_millis(5000));
        assert_eq!(config.delay_for(3), Duration::from_millis(10000));
    }

    #[test]
    fn test_backoff_clamps_attempt_zero() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(0), Duration::from_millis(2500));
    }

    #[test]
    fn test_rate_limit_classification() {
        assert!(is_rate_limit(&BidderError::RateLimited {
            retry_after_ms: None
        }));
        assert!(is_rate_limit(&BidderError::Api(ApiError::new(
            "RATE_LIMITED",
            "slow down"
        ))));
        assert!(!is_rate_limit(&BidderError::Timeout));
    }

    #[test]
    fn test_conflict_classification() {
        assert!(is_conflict(&BidderError::Api(ApiError::new(
            "BID_EXISTS",
            "you already have an active bid for this target"
        ))));
        assert!(!is_conflict(&BidderError::Api(ApiError::new(
            "PRICE_TOO_LOW",
            "below floor"
        ))));
        assert!(!is_conflict(&BidderError::Timeout));
    }
}
