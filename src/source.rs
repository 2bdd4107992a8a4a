//! Chain source adapter: the boundary to the feed APIs.
//!
//! [`ChainSource`] abstracts the four read endpoints so the scheduler can be
//! driven by the HTTP feed in production and by in-memory fakes in tests.
//! [`fetch_cycle`] implements the per-cycle fetch policy: the live cache
//! first, then the snapshot builder whenever the live cache failed or left
//! gaps.

use crate::chain::{LiveChain, RowMap};
use crate::error::{DeskError, SourceKind};
use crate::models::{ChainSelection, DepthLevel, QuoteSource, SideQuote, Strike, StrikeRow};
use chain_client::{ChainClient, LiveChainResponse, SnapshotQuery, SnapshotRow, WireQuote};
use rust_decimal::Decimal;
use std::future::Future;
use tracing::{debug, warn};

/// Read access to the option chain feeds.
pub trait ChainSource: Send + Sync + 'static {
    /// Fetches the live option-chain cache.
    fn live_chain(
        &self,
        selection: &ChainSelection,
    ) -> impl Future<Output = Result<LiveChain, DeskError>> + Send;

    /// Fetches snapshot builder rows centered on `underlying_ltp`.
    fn snapshot(
        &self,
        selection: &ChainSelection,
        underlying_ltp: f64,
    ) -> impl Future<Output = Result<RowMap, DeskError>> + Send;

    /// Fetches the last traded price of the underlying.
    fn underlying_ltp(
        &self,
        underlying: &str,
    ) -> impl Future<Output = Result<f64, DeskError>> + Send;

    /// Fetches the expiry list of the underlying, nearest first.
    fn expiries(
        &self,
        underlying: &str,
    ) -> impl Future<Output = Result<Vec<String>, DeskError>> + Send;
}

/// Raw results of one cycle's fetch stage.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Live cache payload, if the fetch succeeded.
    pub live: Option<LiveChain>,
    /// Snapshot rows, if fetched and successful.
    pub snapshot: Option<RowMap>,
    /// Failures absorbed along the way.
    pub failures: Vec<DeskError>,
}

impl FetchOutcome {
    /// Joins the failure messages for status reporting.
    #[must_use]
    pub fn failure_summary(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        Some(
            self.failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Runs the fetch stage of one refresh cycle.
///
/// A failed live fetch never aborts the cycle: the snapshot builder is tried
/// with the underlying price from the live payload or, failing that, from
/// the LTP endpoint.
pub async fn fetch_cycle<S: ChainSource>(
    source: &S,
    selection: &ChainSelection,
) -> FetchOutcome {
    let mut outcome = FetchOutcome::default();

    match source.live_chain(selection).await {
        Ok(live) => outcome.live = Some(live),
        Err(e) => {
            warn!("Live cache fetch failed for {}: {}", selection, e);
            outcome.failures.push(e);
        }
    }

    let needs_snapshot = outcome.live.as_ref().is_none_or(LiveChain::needs_snapshot);
    if !needs_snapshot {
        return outcome;
    }

    let underlying_ltp = match outcome
        .live
        .as_ref()
        .and_then(LiveChain::usable_underlying_ltp)
    {
        Some(ltp) => Some(ltp),
        None => match source.underlying_ltp(&selection.underlying).await {
            Ok(ltp) if ltp.is_finite() && ltp > 0.0 => Some(ltp),
            Ok(ltp) => {
                outcome.failures.push(DeskError::source_unavailable(
                    SourceKind::UnderlyingLtp,
                    format!("non-positive price {}", ltp),
                ));
                None
            }
            Err(e) => {
                warn!("Underlying LTP fetch failed for {}: {}", selection, e);
                outcome.failures.push(e);
                None
            }
        },
    };

    if let Some(ltp) = underlying_ltp {
        match source.snapshot(selection, ltp).await {
            Ok(rows) => {
                debug!("Snapshot for {} returned {} strikes", selection, rows.len());
                outcome.snapshot = Some(rows);
            }
            Err(e) => {
                warn!("Snapshot fetch failed for {}: {}", selection, e);
                outcome.failures.push(e);
            }
        }
    }

    outcome
}

// ============================================================================
// HTTP source
// ============================================================================

/// [`ChainSource`] backed by the feed HTTP APIs.
#[derive(Debug, Clone)]
pub struct HttpChainSource {
    client: ChainClient,
}

impl HttpChainSource {
    /// Creates a source on top of a feed client.
    #[must_use]
    pub fn new(client: ChainClient) -> Self {
        Self { client }
    }
}

impl ChainSource for HttpChainSource {
    async fn live_chain(&self, selection: &ChainSelection) -> Result<LiveChain, DeskError> {
        let response = self
            .client
            .get_live_chain(&selection.underlying, &selection.expiry)
            .await
            .map_err(|e| DeskError::source_unavailable(SourceKind::LiveCache, e))?;
        Ok(live_chain_from_wire(response))
    }

    async fn snapshot(
        &self,
        selection: &ChainSelection,
        underlying_ltp: f64,
    ) -> Result<RowMap, DeskError> {
        let query = SnapshotQuery::new(&selection.underlying, &selection.expiry, underlying_ltp);
        let rows = self
            .client
            .get_snapshot(&query)
            .await
            .map_err(|e| DeskError::source_unavailable(SourceKind::Snapshot, e))?;
        Ok(snapshot_from_wire(rows))
    }

    async fn underlying_ltp(&self, underlying: &str) -> Result<f64, DeskError> {
        self.client
            .get_ltp(underlying)
            .await
            .map(|response| response.ltp)
            .map_err(|e| DeskError::source_unavailable(SourceKind::UnderlyingLtp, e))
    }

    async fn expiries(&self, underlying: &str) -> Result<Vec<String>, DeskError> {
        self.client
            .list_expiries(underlying)
            .await
            .map(|response| response.expiries)
            .map_err(|e| DeskError::source_unavailable(SourceKind::Expiries, e))
    }
}

// ============================================================================
// Wire conversion
// ============================================================================

/// Converts a wire quote, applying the price alias rule.
#[must_use]
pub fn side_quote_from_wire(wire: Option<&WireQuote>, source: QuoteSource) -> SideQuote {
    let Some(wire) = wire else {
        return SideQuote::empty(source);
    };

    SideQuote {
        last_traded_price: wire.price().unwrap_or(0.0),
        bid: wire.bid,
        ask: wire.ask,
        depth: wire
            .depth
            .iter()
            .flatten()
            .map(|level| DepthLevel {
                price: level.price,
                quantity: level.quantity,
            })
            .collect(),
        instrument_token: wire.instrument_token,
        source,
    }
}

/// Converts the live cache payload. Strike keys that do not parse as a
/// positive decimal are dropped.
#[must_use]
pub fn live_chain_from_wire(response: LiveChainResponse) -> LiveChain {
    let mut rows = RowMap::new();

    for (key, entry) in &response.strikes {
        let Some(strike) = Strike::parse(key) else {
            debug!("Dropping live cache entry with invalid strike {:?}", key);
            continue;
        };
        rows.insert(
            strike,
            StrikeRow::new(
                strike,
                side_quote_from_wire(entry.ce.as_ref(), QuoteSource::LiveCache),
                side_quote_from_wire(entry.pe.as_ref(), QuoteSource::LiveCache),
            ),
        );
    }

    LiveChain {
        atm_strike: response.atm_strike.and_then(Strike::from_f64),
        strike_interval: response
            .strike_interval
            .filter(|interval| interval.is_finite())
            .and_then(|interval| Decimal::try_from(interval).ok())
            .filter(|interval| *interval > Decimal::ZERO)
            .map(|interval| interval.normalize()),
        lot_size: response.lot_size,
        underlying_ltp: response.underlying_ltp,
        rows,
    }
}

/// Converts snapshot builder rows. The first row for a strike wins.
#[must_use]
pub fn snapshot_from_wire(rows: Vec<SnapshotRow>) -> RowMap {
    let mut map = RowMap::new();

    for row in rows {
        let Some(strike) = Strike::from_f64(row.strike) else {
            debug!("Dropping snapshot row with invalid strike {}", row.strike);
            continue;
        };
        map.entry(strike).or_insert_with(|| {
            StrikeRow::new(
                strike,
                side_quote_from_wire(row.ce.as_ref(), QuoteSource::Snapshot),
                side_quote_from_wire(row.pe.as_ref(), QuoteSource::Snapshot),
            )
        });
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn strike(value: Decimal) -> Strike {
        Strike::new(value).unwrap()
    }

    fn rows(source: QuoteSource, entries: &[(Decimal, f64, f64)]) -> RowMap {
        entries
            .iter()
            .map(|(value, ce, pe)| {
                let row = StrikeRow::new(
                    strike(*value),
                    SideQuote::priced(*ce, source),
                    SideQuote::priced(*pe, source),
                );
                (row.strike, row)
            })
            .collect()
    }

    /// Scripted source recording the snapshot LTP it was asked for.
    #[derive(Default)]
    struct ScriptedSource {
        live: Option<LiveChain>,
        ltp: Option<f64>,
        snapshot: Option<RowMap>,
        snapshot_calls: AtomicUsize,
        snapshot_ltp: Mutex<Option<f64>>,
    }

    impl ChainSource for ScriptedSource {
        async fn live_chain(&self, _selection: &ChainSelection) -> Result<LiveChain, DeskError> {
            self.live
                .clone()
                .ok_or_else(|| DeskError::source_unavailable(SourceKind::LiveCache, "down"))
        }

        async fn snapshot(
            &self,
            _selection: &ChainSelection,
            underlying_ltp: f64,
        ) -> Result<RowMap, DeskError> {
            self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
            *self.snapshot_ltp.lock() = Some(underlying_ltp);
            self.snapshot
                .clone()
                .ok_or_else(|| DeskError::source_unavailable(SourceKind::Snapshot, "down"))
        }

        async fn underlying_ltp(&self, _underlying: &str) -> Result<f64, DeskError> {
            self.ltp
                .ok_or_else(|| DeskError::source_unavailable(SourceKind::UnderlyingLtp, "down"))
        }

        async fn expiries(&self, _underlying: &str) -> Result<Vec<String>, DeskError> {
            Ok(vec!["2025-10-28".to_string()])
        }
    }

    fn selection() -> ChainSelection {
        ChainSelection::new("NIFTY", "2025-10-28")
    }

    #[tokio::test]
    async fn test_complete_live_chain_skips_snapshot() {
        let source = ScriptedSource {
            live: Some(LiveChain {
                rows: rows(QuoteSource::LiveCache, &[(dec!(100), 5.0, 6.0)]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let outcome = fetch_cycle(&source, &selection()).await;

        assert!(outcome.live.is_some());
        assert!(outcome.snapshot.is_none());
        assert!(outcome.failures.is_empty());
        assert_eq!(source.snapshot_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_partial_live_chain_uses_live_ltp_for_snapshot() {
        let source = ScriptedSource {
            live: Some(LiveChain {
                underlying_ltp: Some(24510.0),
                rows: rows(QuoteSource::LiveCache, &[(dec!(100), 0.0, 6.0)]),
                ..Default::default()
            }),
            ltp: Some(1.0),
            snapshot: Some(rows(QuoteSource::Snapshot, &[(dec!(100), 5.0, 6.0)])),
            ..Default::default()
        };

        let outcome = fetch_cycle(&source, &selection()).await;

        assert!(outcome.snapshot.is_some());
        assert_eq!(*source.snapshot_ltp.lock(), Some(24510.0));
    }

    #[tokio::test]
    async fn test_live_failure_still_attempts_snapshot() {
        let source = ScriptedSource {
            ltp: Some(24490.0),
            snapshot: Some(rows(QuoteSource::Snapshot, &[(dec!(100), 5.0, 6.0)])),
            ..Default::default()
        };

        let outcome = fetch_cycle(&source, &selection()).await;

        assert!(outcome.live.is_none());
        assert!(outcome.snapshot.is_some());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(*source.snapshot_ltp.lock(), Some(24490.0));
    }

    #[tokio::test]
    async fn test_everything_down_collects_failures() {
        let source = ScriptedSource::default();

        let outcome = fetch_cycle(&source, &selection()).await;

        assert!(outcome.live.is_none());
        assert!(outcome.snapshot.is_none());
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(source.snapshot_calls.load(Ordering::SeqCst), 0);
        let summary = outcome.failure_summary().unwrap();
        assert!(summary.contains("live cache unavailable"));
        assert!(summary.contains("underlying LTP unavailable"));
    }

    #[tokio::test]
    async fn test_non_positive_ltp_is_a_failure() {
        let source = ScriptedSource {
            ltp: Some(0.0),
            ..Default::default()
        };

        let outcome = fetch_cycle(&source, &selection()).await;

        assert!(outcome.snapshot.is_none());
        assert_eq!(source.snapshot_calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            outcome.failures.last(),
            Some(DeskError::SourceUnavailable {
                kind: SourceKind::UnderlyingLtp,
                ..
            })
        ));
    }

    #[test]
    fn test_live_chain_from_wire() {
        let json = r#"{
            "atm_strike": 24500.0,
            "strike_interval": 50.0,
            "lot_size": 75,
            "underlying_ltp": 24512.3,
            "strikes": {
                "24450.0": {"CE": {"ltp": 130.0, "bid": 129.5}, "PE": {"ltp": 70.5}},
                "24500": {"CE": {"ltp": 98.0}},
                "bogus": {"CE": {"ltp": 1.0}}
            }
        }"#;
        let response: LiveChainResponse = serde_json::from_str(json).unwrap();

        let live = live_chain_from_wire(response);

        assert_eq!(live.atm_strike, Some(strike(dec!(24500))));
        assert_eq!(live.strike_interval, Some(dec!(50)));
        assert_eq!(live.rows.len(), 2);
        let row = &live.rows[&strike(dec!(24450))];
        assert_eq!(row.ce.bid, Some(129.5));
        assert_eq!(row.ce.source, QuoteSource::LiveCache);
        let missing_pe = &live.rows[&strike(dec!(24500))].pe;
        assert!(!missing_pe.is_usable());
    }

    #[test]
    fn test_snapshot_from_wire_applies_aliases() {
        let json = r#"[
            {"strike": 100, "ce": {"ltp": 0, "close": 5.0}, "pe": {"last_price": 6.0}},
            {"strike": 100, "ce": {"ltp": 99.0}},
            {"strike": -5, "ce": {"ltp": 1.0}}
        ]"#;
        let wire: Vec<SnapshotRow> = serde_json::from_str(json).unwrap();

        let rows = snapshot_from_wire(wire);

        assert_eq!(rows.len(), 1);
        let row = &rows[&strike(dec!(100))];
        assert_eq!(row.ce.last_traded_price, 5.0);
        assert_eq!(row.pe.last_traded_price, 6.0);
        assert_eq!(row.ce.source, QuoteSource::Snapshot);
    }

    #[test]
    fn test_side_quote_from_wire_depth() {
        let wire = WireQuote {
            ltp: Some(12.0),
            depth: Some(vec![chain_client::WireDepthLevel {
                price: 11.95,
                quantity: 150,
            }]),
            instrument_token: Some(42),
            ..Default::default()
        };

        let quote = side_quote_from_wire(Some(&wire), QuoteSource::LiveCache);

        assert_eq!(quote.depth.len(), 1);
        assert_eq!(quote.depth[0].quantity, 150);
        assert_eq!(quote.instrument_token, Some(42));
        assert!(!side_quote_from_wire(None, QuoteSource::Snapshot).is_usable());
    }
}
