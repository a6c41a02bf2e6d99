//! Bid lifecycle bookkeeping.
//!
//! The ledger keeps one [`CollectionHistory`] per collection: our active
//! bids, which of them currently sit on top, a capped list of recently
//! seen low listings, and a couple of lifetime counters. Every map is
//! bounded: insertion beyond the cap evicts, and a pruning pass removes
//! entries long past their expiry, so stale state never accumulates for
//! the lifetime of the process.
//!
//! All mutations are synchronous and local to one collection's entry; no
//! cross-collection invariant exists.

mod recent;

pub use recent::RecentActionCache;

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

/// Maximum active bids tracked per collection.
pub const DEFAULT_MAX_BIDS_PER_COLLECTION: usize = 100;

/// Maximum low-listing snapshots kept per collection.
pub const DEFAULT_MAX_LOW_LISTINGS: usize = 25;

/// Age past expiry after which a bid entry is pruned.
pub const DEFAULT_PRUNE_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// What kind of offer a collection's bids are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferKind {
    /// A collection-wide offer, good for any item.
    Collection,
    /// An offer on one specific token.
    Token,
}

/// One of our active bids.
#[derive(Debug, Clone, PartialEq)]
pub struct BidEntry {
    /// Offered price.
    pub price: Decimal,
    /// When the bid expires on the marketplace.
    pub expiry: OffsetDateTime,
    /// Action address of the wallet that owns the bid.
    pub owner: String,
}

/// A recently seen low listing.
#[derive(Debug, Clone, PartialEq)]
pub struct LowListing {
    /// Listing/token identifier.
    pub id: String,
    /// Listed price.
    pub price: Decimal,
}

/// Aggregate numbers for one collection, for a monitoring surface.
#[derive(Debug, Clone)]
pub struct CollectionStats {
    /// Active bids currently tracked.
    pub active_bids: usize,
    /// How many of them are marked as top bid.
    pub top_bids: usize,
    /// Items won so far.
    pub items_won: u32,
    /// Last time any event touched this collection.
    pub last_activity: Option<OffsetDateTime>,
}

/// Per-collection bid history.
#[derive(Debug)]
pub struct CollectionHistory {
    /// Kind of offers placed on this collection.
    pub offer_kind: OfferKind,
    /// target -> our active bid
    our_bids: HashMap<String, BidEntry>,
    /// target -> are we currently the top bid
    top_bid: HashMap<String, bool>,
    /// Most recent low listings, newest first.
    low_listings: Vec<LowListing>,
    /// Items won on this collection.
    items_won: u32,
    /// Last seen activity of any kind.
    last_activity: Option<OffsetDateTime>,
}

impl CollectionHistory {
    fn new(offer_kind: OfferKind) -> Self {
        Self {
            offer_kind,
            our_bids: HashMap::new(),
            top_bid: HashMap::new(),
            low_listings: Vec::new(),
            items_won: 0,
            last_activity: None,
        }
    }
}

/// Bounded, self-pruning record of bids across collections.
///
/// Collections are created on the first event that mentions them and live
/// for the process lifetime, bounded by the per-collection caps.
#[derive(Debug)]
pub struct BidLedger {
    collections: HashMap<String, CollectionHistory>,
    max_bids: usize,
    max_low_listings: usize,
}

impl BidLedger {
    /// Create a ledger with default caps.
    pub fn new() -> Self {
        Self::with_caps(DEFAULT_MAX_BIDS_PER_COLLECTION, DEFAULT_MAX_LOW_LISTINGS)
    }

    /// Create a ledger with explicit caps.
    pub fn with_caps(max_bids: usize, max_low_listings: usize) -> Self {
        Self {
            collections: HashMap::new(),
            max_bids,
            max_low_listings,
        }
    }

    fn history_mut(&mut self, collection: &str, kind: OfferKind) -> &mut CollectionHistory {
        self.collections
            .entry(collection.to_string())
            .or_insert_with(|| CollectionHistory::new(kind))
    }

    /// Insert or overwrite our bid on a target.
    ///
    /// When the insertion pushes the collection past its cap, the
    /// soonest-expiring entries are evicted until the cap holds again.
    pub fn upsert_bid(
        &mut self,
        collection: &str,
        target: &str,
        price: Decimal,
        expiry: OffsetDateTime,
        owner: &str,
    ) {
        let max_bids = self.max_bids;
        let history = self.history_mut(collection, OfferKind::Token);
        history.our_bids.insert(
            target.to_string(),
            BidEntry {
                price,
                expiry,
                owner: owner.to_string(),
            },
        );
        history.last_activity = Some(OffsetDateTime::now_utc());

        while history.our_bids.len() > max_bids {
            let evict = history
                .our_bids
                .iter()
                .min_by_key(|(_, entry)| entry.expiry)
                .map(|(target, _)| target.clone());
            match evict {
                Some(target) => {
                    debug!(%collection, %target, "bid cap reached, evicting soonest-expiring");
                    history.our_bids.remove(&target);
                    history.top_bid.remove(&target);
                }
                None => break,
            }
        }
    }

    /// Remove our bid on a target, for example after cancelling it remotely.
    pub fn remove_bid(&mut self, collection: &str, target: &str) -> Option<BidEntry> {
        let history = self.collections.get_mut(collection)?;
        history.top_bid.remove(target);
        history.our_bids.remove(target)
    }

    /// Get our bid on a target, if any.
    pub fn bid(&self, collection: &str, target: &str) -> Option<&BidEntry> {
        self.collections.get(collection)?.our_bids.get(target)
    }

    /// Record whether our bid on a target is currently the top bid.
    pub fn mark_top(&mut self, collection: &str, target: &str, is_top: bool) {
        let history = self.history_mut(collection, OfferKind::Token);
        history.top_bid.insert(target.to_string(), is_top);
    }

    /// Check whether we are currently the top bid on a target.
    pub fn is_top(&self, collection: &str, target: &str) -> bool {
        self.collections
            .get(collection)
            .and_then(|h| h.top_bid.get(target).copied())
            .unwrap_or(false)
    }

    /// Set the offer kind for a collection, creating it if needed.
    pub fn set_offer_kind(&mut self, collection: &str, kind: OfferKind) {
        self.history_mut(collection, kind).offer_kind = kind;
    }

    /// Remove entries whose expiry is more than `max_age` in the past.
    ///
    /// Returns the number removed, for observability.
    pub fn prune_expired(&mut self, collection: &str, max_age: Duration) -> usize {
        let Some(history) = self.collections.get_mut(collection) else {
            return 0;
        };
        let cutoff = OffsetDateTime::now_utc() - max_age;
        let before = history.our_bids.len();
        history.our_bids.retain(|_, entry| entry.expiry >= cutoff);
        let top_bid = &mut history.top_bid;
        let our_bids = &history.our_bids;
        top_bid.retain(|target, _| our_bids.contains_key(target));
        let removed = before - history.our_bids.len();
        if removed > 0 {
            debug!(%collection, removed, "pruned long-expired bids");
        }
        removed
    }

    /// Find owned targets that no longer appear among the freshest low
    /// listings. Callers use the result to decide what to cancel.
    pub fn find_orphans(&self, collection: &str, current_low_listings: &[String]) -> Vec<String> {
        let Some(history) = self.collections.get(collection) else {
            return Vec::new();
        };
        let current: HashSet<&str> = current_low_listings.iter().map(String::as_str).collect();
        history
            .our_bids
            .keys()
            .filter(|target| !current.contains(target.as_str()))
            .cloned()
            .collect()
    }

    /// Record a low listing, newest first, keeping the list capped.
    pub fn record_low_listing(&mut self, collection: &str, id: &str, price: Decimal) {
        let max = self.max_low_listings;
        let history = self.history_mut(collection, OfferKind::Token);
        history.low_listings.retain(|listing| listing.id != id);
        history.low_listings.insert(
            0,
            LowListing {
                id: id.to_string(),
                price,
            },
        );
        history.low_listings.truncate(max);
        history.last_activity = Some(OffsetDateTime::now_utc());
    }

    /// The most recent low listings for a collection, newest first.
    pub fn low_listings(&self, collection: &str) -> &[LowListing] {
        self.collections
            .get(collection)
            .map_or(&[], |h| h.low_listings.as_slice())
    }

    /// Count an item won on a collection.
    pub fn record_win(&mut self, collection: &str) {
        let history = self.history_mut(collection, OfferKind::Token);
        history.items_won += 1;
        history.last_activity = Some(OffsetDateTime::now_utc());
    }

    /// Aggregate numbers for one collection.
    pub fn collection_stats(&self, collection: &str) -> Option<CollectionStats> {
        let history = self.collections.get(collection)?;
        Some(CollectionStats {
            active_bids: history.our_bids.len(),
            top_bids: history.top_bid.values().filter(|&&top| top).count(),
            items_won: history.items_won,
            last_activity: history.last_activity,
        })
    }

    /// Number of collections tracked.
    pub fn tracked_collections(&self) -> usize {
        self.collections.len()
    }
}

impl Default for BidLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn minutes_from_now(minutes: i64) -> OffsetDateTime {
        OffsetDateTime::now_utc() + time::Duration::minutes(minutes)
    }

    #[test]
    fn test_upsert_and_lookup() {
        let mut ledger = BidLedger::new();
        ledger.upsert_bid("azuki", "tok-1", d("1.25"), minutes_from_now(30), "addr-a");

        let bid = ledger.bid("azuki", "tok-1").unwrap();
        assert_eq!(bid.price, d("1.25"));
        assert_eq!(bid.owner, "addr-a");
        assert!(ledger.bid("azuki", "tok-2").is_none());
    }

    #[test]
    fn test_upsert_overwrites() {
        let mut ledger = BidLedger::new();
        ledger.upsert_bid("azuki", "tok-1", d("1.0"), minutes_from_now(30), "addr-a");
        ledger.upsert_bid("azuki", "tok-1", d("1.5"), minutes_from_now(45), "addr-b");

        assert_eq!(ledger.collection_stats("azuki").unwrap().active_bids, 1);
        assert_eq!(ledger.bid("azuki", "tok-1").unwrap().price, d("1.5"));
    }

    #[test]
    fn test_cap_evicts_soonest_expiring() {
        let mut ledger = BidLedger::with_caps(3, 25);

        // tok-0 expires soonest, tok-3 latest.
        for i in 0..4 {
            ledger.upsert_bid(
                "azuki",
                &format!("tok-{i}"),
                d("1.0"),
                minutes_from_now(10 + i),
                "addr",
            );
        }

        assert_eq!(ledger.collection_stats("azuki").unwrap().active_bids, 3);
        assert!(ledger.bid("azuki", "tok-0").is_none());
        assert!(ledger.bid("azuki", "tok-3").is_some());
    }

    #[test]
    fn test_cap_holds_under_bulk_insert() {
        let mut ledger = BidLedger::with_caps(10, 25);
        for i in 0..50 {
            ledger.upsert_bid(
                "azuki",
                &format!("tok-{i}"),
                d("1.0"),
                minutes_from_now(i),
                "addr",
            );
        }
        assert_eq!(ledger.collection_stats("azuki").unwrap().active_bids, 10);
        // Survivors are the latest-expiring ones.
        for i in 40..50 {
            assert!(ledger.bid("azuki", &format!("tok-{i}")).is_some());
        }
    }

    #[test]
    fn test_mark_top_and_is_top() {
        let mut ledger = BidLedger::new();
        ledger.upsert_bid("azuki", "tok-1", d("1.0"), minutes_from_now(30), "addr");

        assert!(!ledger.is_top("azuki", "tok-1"));
        ledger.mark_top("azuki", "tok-1", true);
        assert!(ledger.is_top("azuki", "tok-1"));
        ledger.mark_top("azuki", "tok-1", false);
        assert!(!ledger.is_top("azuki", "tok-1"));
    }

    #[test]
    fn test_prune_expired() {
        let mut ledger = BidLedger::new();
        // Expired 25h ago: prunable at the default 24h age.
        ledger.upsert_bid("azuki", "stale", d("1.0"), minutes_from_now(-25 * 60), "addr");
        // Expired 1h ago: expired but not old enough to prune.
        ledger.upsert_bid("azuki", "recent", d("1.0"), minutes_from_now(-60), "addr");
        ledger.upsert_bid("azuki", "live", d("1.0"), minutes_from_now(60), "addr");
        ledger.mark_top("azuki", "stale", true);

        let removed = ledger.prune_expired("azuki", DEFAULT_PRUNE_AGE);
        assert_eq!(removed, 1);
        assert!(ledger.bid("azuki", "stale").is_none());
        assert!(ledger.bid("azuki", "recent").is_some());
        assert!(ledger.bid("azuki", "live").is_some());
        // The pruned entry's top flag went with it.
        assert!(!ledger.is_top("azuki", "stale"));
    }

    #[test]
    fn test_prune_unknown_collection() {
        let mut ledger = BidLedger::new();
        assert_eq!(ledger.prune_expired("nobody", DEFAULT_PRUNE_AGE), 0);
    }

    #[test]
    fn test_find_orphans() {
        let mut ledger = BidLedger::new();
        ledger.upsert_bid("azuki", "tok-1", d("1.0"), minutes_from_now(30), "addr");
        ledger.upsert_bid("azuki", "tok-2", d("1.0"), minutes_from_now(30), "addr");
        ledger.upsert_bid("azuki", "tok-3", d("1.0"), minutes_from_now(30), "addr");

        let current = vec!["tok-1".to_string(), "tok-3".to_string()];
        let orphans = ledger.find_orphans("azuki", &current);
        assert_eq!(orphans, vec!["tok-2".to_string()]);
    }

    #[test]
    fn test_low_listings_capped_and_deduped() {
        let mut ledger = BidLedger::with_caps(100, 3);
        for i in 0..5 {
            ledger.record_low_listing("azuki", &format!("list-{i}"), d("0.5"));
        }
        let listings = ledger.low_listings("azuki");
        assert_eq!(listings.len(), 3);
        assert_eq!(listings[0].id, "list-4");

        // Re-recording an id moves it to the front instead of duplicating.
        ledger.record_low_listing("azuki", "list-3", d("0.4"));
        let listings = ledger.low_listings("azuki");
        assert_eq!(listings.len(), 3);
        assert_eq!(listings[0].id, "list-3");
    }

    #[test]
    fn test_wins_and_stats() {
        let mut ledger = BidLedger::new();
        ledger.upsert_bid("azuki", "tok-1", d("1.0"), minutes_from_now(30), "addr");
        ledger.mark_top("azuki", "tok-1", true);
        ledger.record_win("azuki");
        ledger.record_win("azuki");

        let stats = ledger.collection_stats("azuki").unwrap();
        assert_eq!(stats.active_bids, 1);
        assert_eq!(stats.top_bids, 1);
        assert_eq!(stats.items_won, 2);
        assert!(stats.last_activity.is_some());
    }
}
