//! Marketplace REST endpoint constants.

/// Base URL for the marketplace REST API.
pub const MARKETPLACE_BASE_URL: &str = "https://api.nftmarket.io";

/// Place a bid.
pub const BIDS: &str = "/v1/bids";

/// Look up our open bid for a target.
pub const OPEN_BID: &str = "/v1/bids/open";

/// Path for cancelling a specific bid.
pub fn bid_path(bid_id: &str) -> String {
    format!("/v1/bids/{bid_id}")
}

/// Path for a collection's lowest listings.
pub fn collection_listings_path(collection: &str) -> String {
    format!("/v1/collections/{collection}/listings")
}
