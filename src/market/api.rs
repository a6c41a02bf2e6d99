//! Marketplace API trait and wire types.
//!
//! The [`MarketplaceApi`] trait abstracts the remote marketplace. This
//! enables:
//! - Mock implementations for testing
//! - Alternative transports behind the same submitter

use std::future::Future;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{TimestampSeconds, serde_as};
use time::OffsetDateTime;

use crate::auth::WalletCredentials;
use crate::error::BidderError;
use crate::ledger::OfferKind;

/// A bid to be placed, before signing.
#[serde_as]
#[derive(Debug, Clone, Serialize)]
pub struct PlaceBidRequest {
    /// Collection slug.
    pub collection: String,
    /// Target identifier: a token id, or the collection slug for
    /// collection-wide offers.
    pub target: String,
    /// Offer kind.
    pub kind: OfferKind,
    /// Offered price.
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    /// When the bid expires.
    #[serde_as(as = "TimestampSeconds<i64>")]
    pub expiry: OffsetDateTime,
    /// Address that receives the item on acceptance.
    pub payout_address: String,
}

/// Confirmation of a placed bid.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct BidReceipt {
    /// Marketplace-assigned bid id.
    pub bid_id: String,
    /// Collection slug.
    pub collection: String,
    /// Target identifier.
    pub target: String,
    /// Accepted price.
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    /// Accepted expiry.
    #[serde_as(as = "TimestampSeconds<i64>")]
    pub expiry: OffsetDateTime,
}

/// An open bid of ours, as reported by the marketplace.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct OpenBid {
    /// Marketplace-assigned bid id.
    pub bid_id: String,
    /// Target identifier.
    pub target: String,
    /// Current price.
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    /// Expiry.
    #[serde_as(as = "TimestampSeconds<i64>")]
    pub expiry: OffsetDateTime,
    /// Action address of the owning wallet.
    pub bidder: String,
}

/// One listing from a collection's low-listings feed.
#[derive(Debug, Clone, Deserialize)]
pub struct LowListingSnapshot {
    /// Listing/token identifier.
    pub id: String,
    /// Listed price.
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
}

/// The marketplace capability consumed by the submitter.
///
/// Mutating calls are authorized by the wallet whose slot was reserved
/// for the action; read calls identify the wallet by action address only.
pub trait MarketplaceApi: Send + Sync {
    /// Place a bid signed by the given wallet.
    fn place_bid(
        &self,
        wallet: &WalletCredentials,
        request: &PlaceBidRequest,
    ) -> impl Future<Output = Result<BidReceipt, BidderError>> + Send;

    /// Cancel one of the wallet's bids.
    fn cancel_bid(
        &self,
        wallet: &WalletCredentials,
        bid_id: &str,
    ) -> impl Future<Output = Result<(), BidderError>> + Send;

    /// Find the wallet's open bid for a target, if any.
    fn open_bid_for(
        &self,
        wallet: &WalletCredentials,
        target: &str,
    ) -> impl Future<Output = Result<Option<OpenBid>, BidderError>> + Send;

    /// Fetch the lowest listings for a collection.
    fn lowest_listings(
        &self,
        collection: &str,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<LowListingSnapshot>, BidderError>> + Send;
}
