//! Per-quote reconciliation of the live cache and the snapshot builder.

use crate::models::{QuoteSource, SideQuote, Strike, StrikeRow};
use std::collections::{BTreeMap, BTreeSet};

/// Rows keyed by strike, as produced by one feed.
pub type RowMap = BTreeMap<Strike, StrikeRow>;

/// Merges the two feeds into one row per strike in the union of both key
/// sets, ascending by strike.
///
/// For each side the live quote wins when usable. Otherwise a usable snapshot
/// quote is taken and tagged [`QuoteSource::Merged`]. Otherwise the side is
/// left without a price.
#[must_use]
pub fn merge_quotes(live: &RowMap, snapshot: &RowMap) -> Vec<StrikeRow> {
    let strikes: BTreeSet<Strike> = live.keys().chain(snapshot.keys()).copied().collect();

    strikes
        .into_iter()
        .map(|strike| {
            let live_row = live.get(&strike);
            let snapshot_row = snapshot.get(&strike);
            StrikeRow {
                strike,
                ce: merge_side(
                    live_row.map(|row| &row.ce),
                    snapshot_row.map(|row| &row.ce),
                ),
                pe: merge_side(
                    live_row.map(|row| &row.pe),
                    snapshot_row.map(|row| &row.pe),
                ),
            }
        })
        .collect()
}

fn merge_side(live: Option<&SideQuote>, snapshot: Option<&SideQuote>) -> SideQuote {
    if let Some(quote) = live.filter(|quote| quote.is_usable()) {
        return SideQuote {
            source: QuoteSource::LiveCache,
            ..quote.clone()
        };
    }

    if let Some(quote) = snapshot.filter(|quote| quote.is_usable()) {
        return SideQuote {
            source: QuoteSource::Merged,
            ..quote.clone()
        };
    }

    match live.or(snapshot) {
        Some(quote) => SideQuote {
            last_traded_price: 0.0,
            ..quote.clone()
        },
        None => SideQuote::empty(QuoteSource::LiveCache),
    }
}
