//! Chain reconciliation: normalization, lot sizes, quote merging, ATM
//! resolution and display windowing.

mod atm;
mod lot_size;
mod merger;
mod normalizer;
mod window;

pub use atm::{AtmMethod, AtmResolution, min_straddle_strike, resolve_atm};
pub use lot_size::LotSizeResolver;
pub use merger::{RowMap, merge_quotes};
pub use normalizer::normalize_underlying;
pub use window::{
    DisplayWindow, DisplayWindowSelector, STRADDLE_WINDOW_SIZE, WindowCenter, nearest_index,
    window_bounds,
};

use crate::models::{Chain, ChainSelection, Strike};
use rust_decimal::Decimal;

/// Live cache payload converted to domain rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveChain {
    /// Authoritative ATM strike.
    pub atm_strike: Option<Strike>,
    /// Distance between consecutive strikes.
    pub strike_interval: Option<Decimal>,
    /// Lot size reported by the cache.
    pub lot_size: Option<f64>,
    /// Underlying last traded price.
    pub underlying_ltp: Option<f64>,
    /// Rows keyed by strike.
    pub rows: RowMap,
}

impl LiveChain {
    /// True when the snapshot builder has to fill gaps: the cache is empty
    /// or some row lacks a usable side.
    #[must_use]
    pub fn needs_snapshot(&self) -> bool {
        self.rows.is_empty() || self.rows.values().any(|row| !row.is_trade_ready())
    }

    /// Underlying price, when positive.
    #[must_use]
    pub fn usable_underlying_ltp(&self) -> Option<f64> {
        self.underlying_ltp
            .filter(|ltp| ltp.is_finite() && *ltp > 0.0)
    }
}

/// Builds a new chain from whatever the two feeds delivered this cycle.
#[must_use]
pub fn build_chain(
    selection: &ChainSelection,
    live: Option<&LiveChain>,
    snapshot: Option<&RowMap>,
    lot_sizes: &LotSizeResolver,
) -> Chain {
    let empty = RowMap::new();
    let strikes = merge_quotes(
        live.map(|chain| &chain.rows).unwrap_or(&empty),
        snapshot.unwrap_or(&empty),
    );

    Chain {
        underlying: selection.underlying.clone(),
        expiry: selection.expiry.clone(),
        lot_size: lot_sizes.resolve(
            &selection.underlying,
            live.and_then(|chain| chain.lot_size),
        ),
        atm_strike: live.and_then(|chain| chain.atm_strike),
        strike_interval: live.and_then(|chain| chain.strike_interval),
        underlying_ltp: live.and_then(LiveChain::usable_underlying_ltp),
        strikes,
    }
}
