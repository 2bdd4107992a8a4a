//! Wire types for the option chain feed APIs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;


// ============================================================================
// Quotes
// ============================================================================

/// One level of top-of-book depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDepthLevel {
    /// Price at this level.
    pub price: f64,
    /// Quantity resting at this level.
    #[serde(default)]
    pub quantity: u64,
}

/// Quote for one side (CE or PE) of a strike as sent by either feed.
///
/// The feeds disagree on the name of the traded price, so all known aliases
/// are accepted and resolved by [`WireQuote::price`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireQuote {
    /// Last traded price.
    #[serde(default)]
    pub ltp: Option<f64>,
    /// Close price, used by the snapshot builder.
    #[serde(default)]
    pub close: Option<f64>,
    /// Last price, used by older builder payloads.
    #[serde(default)]
    pub last_price: Option<f64>,
    /// Best bid.
    #[serde(default)]
    pub bid: Option<f64>,
    /// Best ask.
    #[serde(default)]
    pub ask: Option<f64>,
    /// Top-of-book depth.
    #[serde(default)]
    pub depth: Option<Vec<WireDepthLevel>>,
    /// Exchange instrument token.
    #[serde(default)]
    pub instrument_token: Option<u64>,
}

impl WireQuote {
    /// Returns the traded price using the `ltp`, `close`, `last_price`
    /// priority order. The first alias carrying a positive finite value wins.
    #[must_use]
    pub fn price(&self) -> Option<f64> {
        [self.ltp, self.close, self.last_price]
            .into_iter()
            .flatten()
            .find(|price| price.is_finite() && *price > 0.0)
    }
}

// ============================================================================
// Live cache
// ============================================================================

/// Both sides of one strike in the live cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveStrikeEntry {
    /// Call side.
    #[serde(rename = "CE", alias = "ce", default)]
    pub ce: Option<WireQuote>,
    /// Put side.
    #[serde(rename = "PE", alias = "pe", default)]
    pub pe: Option<WireQuote>,
}

/// Live option-chain cache response for one underlying and expiry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveChainResponse {
    /// Authoritative ATM strike, when the cache computed one.
    #[serde(default)]
    pub atm_strike: Option<f64>,
    /// Distance between consecutive strikes.
    #[serde(default)]
    pub strike_interval: Option<f64>,
    /// Exchange lot size.
    #[serde(default)]
    pub lot_size: Option<f64>,
    /// Last traded price of the underlying.
    #[serde(default)]
    pub underlying_ltp: Option<f64>,
    /// Quotes keyed by the strike as a decimal string.
    #[serde(default)]
    pub strikes: BTreeMap<String, LiveStrikeEntry>,
}

// ============================================================================
// Snapshot builder
// ============================================================================

/// Query parameters for the snapshot builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotQuery {
    /// Canonical underlying symbol.
    pub underlying: String,
    /// Expiry identifier.
    pub expiry: String,
    /// Underlying price the builder centers its strikes on.
    pub underlying_ltp: f64,
}

impl SnapshotQuery {
    /// Creates a new snapshot query.
    #[must_use]
    pub fn new(underlying: &str, expiry: &str, underlying_ltp: f64) -> Self {
        Self {
            underlying: underlying.to_string(),
            expiry: expiry.to_string(),
            underlying_ltp,
        }
    }
}

/// One `{strike, ce, pe}` triple from the snapshot builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    /// Strike price.
    pub strike: f64,
    /// Call side.
    #[serde(alias = "CE", default)]
    pub ce: Option<WireQuote>,
    /// Put side.
    #[serde(alias = "PE", default)]
    pub pe: Option<WireQuote>,
}

// ============================================================================
// Underlying & expiries
// ============================================================================

/// Underlying last traded price response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LtpResponse {
    /// Last traded price.
    #[serde(alias = "last_price")]
    pub ltp: f64,
}

/// Expiry list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiriesResponse {
    /// Expiry identifiers, nearest first.
    pub expiries: Vec<String>,
}
