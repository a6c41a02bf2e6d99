//! Marketplace collaborator surface.
//!
//! The scheduler core treats the marketplace as a thin, swappable
//! collaborator: [`MarketplaceApi`] is the seam, [`HttpMarketplaceClient`]
//! the default REST implementation. Swap in another implementation (or a
//! test double) by implementing the trait.

mod api;
mod client;
pub mod endpoints;

pub use api::{
    BidReceipt, LowListingSnapshot, MarketplaceApi, OpenBid, PlaceBidRequest,
};
pub use client::{HttpMarketplaceClient, HttpMarketplaceClientBuilder};
