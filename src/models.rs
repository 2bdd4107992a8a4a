//! Domain model for resolved option chains and order legs.

use crate::chain::normalize_underlying;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A positive strike price level.
///
/// Always stored normalized, so `24500.0` and `24500` are the same strike and
/// both print as `24500`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Strike(Decimal);

impl Strike {
    /// Creates a strike from a decimal value. Returns `None` unless positive.
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        (value > Decimal::ZERO).then(|| Self(value.normalize()))
    }

    /// Creates a strike from a float as received on the wire.
    #[must_use]
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        Decimal::try_from(value).ok().and_then(Self::new)
    }

    /// Parses a strike from a decimal string such as `"24500"` or `"24500.0"`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Decimal::from_str(value.trim()).ok().and_then(Self::new)
    }

    /// Returns the decimal value.
    #[must_use]
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Returns the absolute distance to another strike.
    #[must_use]
    pub fn distance(&self, other: Strike) -> Decimal {
        (self.0 - other.0).abs()
    }
}

impl std::fmt::Display for Strike {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Call or put side of a strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionSide {
    /// Call option.
    Ce,
    /// Put option.
    Pe,
}

impl std::fmt::Display for OptionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ce => write!(f, "CE"),
            Self::Pe => write!(f, "PE"),
        }
    }
}

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderAction {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

impl std::fmt::Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Where a side quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSource {
    /// Authoritative live cache.
    LiveCache,
    /// Snapshot builder, before reconciliation.
    Snapshot,
    /// Snapshot quote filled in for a side the live cache lacked.
    Merged,
}

impl std::fmt::Display for QuoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LiveCache => write!(f, "live_cache"),
            Self::Snapshot => write!(f, "snapshot"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

/// One top-of-book depth level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    /// Price.
    pub price: f64,
    /// Quantity.
    pub quantity: u64,
}

/// Quote for one side of a strike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideQuote {
    /// Last traded price. Zero means no usable quote.
    pub last_traded_price: f64,
    /// Best bid.
    pub bid: Option<f64>,
    /// Best ask.
    pub ask: Option<f64>,
    /// Top-of-book depth.
    pub depth: Vec<DepthLevel>,
    /// Exchange instrument token.
    pub instrument_token: Option<u64>,
    /// Provenance.
    pub source: QuoteSource,
}

impl SideQuote {
    /// Creates a quote with only a price set.
    #[must_use]
    pub fn priced(last_traded_price: f64, source: QuoteSource) -> Self {
        Self {
            last_traded_price,
            bid: None,
            ask: None,
            depth: Vec::new(),
            instrument_token: None,
            source,
        }
    }

    /// Creates a quote without a usable price.
    #[must_use]
    pub fn empty(source: QuoteSource) -> Self {
        Self::priced(0.0, source)
    }

    /// Returns true if the last traded price is positive and finite.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.last_traded_price.is_finite() && self.last_traded_price > 0.0
    }

    /// Returns the price when usable.
    #[must_use]
    pub fn price(&self) -> Option<f64> {
        self.is_usable().then_some(self.last_traded_price)
    }
}

/// Both sides of one strike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeRow {
    /// Strike price.
    pub strike: Strike,
    /// Call quote.
    pub ce: SideQuote,
    /// Put quote.
    pub pe: SideQuote,
}

impl StrikeRow {
    /// Creates a row from its two sides.
    #[must_use]
    pub fn new(strike: Strike, ce: SideQuote, pe: SideQuote) -> Self {
        Self { strike, ce, pe }
    }

    /// Returns the quote for a side.
    #[must_use]
    pub fn side(&self, side: OptionSide) -> &SideQuote {
        match side {
            OptionSide::Ce => &self.ce,
            OptionSide::Pe => &self.pe,
        }
    }

    /// At least one side has a usable price.
    #[must_use]
    pub fn is_display_valid(&self) -> bool {
        self.ce.is_usable() || self.pe.is_usable()
    }

    /// Both sides have a usable price.
    #[must_use]
    pub fn is_trade_ready(&self) -> bool {
        self.ce.is_usable() && self.pe.is_usable()
    }

    /// CE + PE price, only for trade-ready rows.
    #[must_use]
    pub fn straddle_premium(&self) -> Option<f64> {
        Some(self.ce.price()? + self.pe.price()?)
    }
}

/// Underlying and expiry a view is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainSelection {
    /// Canonical underlying symbol.
    pub underlying: String,
    /// Expiry identifier.
    pub expiry: String,
}

impl ChainSelection {
    /// Creates a selection, normalizing the underlying display name.
    #[must_use]
    pub fn new(underlying: &str, expiry: &str) -> Self {
        Self {
            underlying: normalize_underlying(underlying),
            expiry: expiry.trim().to_string(),
        }
    }
}

impl std::fmt::Display for ChainSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.underlying, self.expiry)
    }
}

/// A fully reconciled option chain for one underlying and expiry.
///
/// Rebuilt wholesale on every refresh and never mutated after publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    /// Canonical underlying symbol.
    pub underlying: String,
    /// Expiry identifier.
    pub expiry: String,
    /// Resolved lot size.
    pub lot_size: u32,
    /// Authoritative ATM strike from the live cache.
    pub atm_strike: Option<Strike>,
    /// Distance between consecutive strikes.
    pub strike_interval: Option<Decimal>,
    /// Underlying last traded price.
    pub underlying_ltp: Option<f64>,
    /// Rows in ascending strike order.
    pub strikes: Vec<StrikeRow>,
}

impl Chain {
    /// Looks up a row by strike.
    #[must_use]
    pub fn row(&self, strike: Strike) -> Option<&StrikeRow> {
        self.strikes
            .binary_search_by_key(&strike, |row| row.strike)
            .ok()
            .map(|index| &self.strikes[index])
    }

    /// Number of rows with at least one usable side.
    #[must_use]
    pub fn display_valid_count(&self) -> usize {
        self.strikes
            .iter()
            .filter(|row| row.is_display_valid())
            .count()
    }

    /// Number of rows with both sides usable.
    #[must_use]
    pub fn trade_ready_count(&self) -> usize {
        self.strikes.iter().filter(|row| row.is_trade_ready()).count()
    }
}

/// A futures contract row, traded without an option side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuturesRow {
    /// Canonical underlying symbol.
    pub underlying: String,
    /// Expiry identifier.
    pub expiry: String,
    /// Last traded price.
    pub last_traded_price: f64,
    /// Lot size reported by the feed.
    pub lot_size: Option<u32>,
}

/// One leg handed to the order-entry collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLeg {
    /// Instrument symbol, `{underlying}_{strike}_{CE|PE}` or `{underlying}_FUT`.
    pub symbol: String,
    /// Option side, `None` for futures.
    pub side: Option<OptionSide>,
    /// Buy or sell.
    pub action: OrderAction,
    /// Reference price.
    pub price: f64,
    /// Lot size.
    pub lot_size: u32,
    /// Canonical underlying symbol.
    pub underlying: String,
    /// Expiry identifier.
    pub expiry: String,
}
