use super::*;
use crate::chain::{LiveChain, RowMap, STRADDLE_WINDOW_SIZE, WindowCenter};
use crate::error::{DeskError, SourceKind};
use crate::models::{QuoteSource, SideQuote};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

fn nifty() -> ChainSelection {
    ChainSelection::new("NIFTY", "2025-10-28")
}

fn ladder_rows(count: u64, ce: f64, pe: f64) -> RowMap {
    (0..count)
        .map(|i| {
            let strike = Strike::new(Decimal::from(24000 + 50 * i)).unwrap();
            let row = StrikeRow::new(
                strike,
                SideQuote::priced(ce, QuoteSource::LiveCache),
                SideQuote::priced(pe, QuoteSource::LiveCache),
            );
            (strike, row)
        })
        .collect()
}

fn live_outcome(atm: Option<u64>) -> FetchOutcome {
    FetchOutcome {
        live: Some(LiveChain {
            atm_strike: atm.and_then(|value| Strike::new(Decimal::from(value))),
            rows: ladder_rows(50, 10.0, 12.0),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn failed_outcome() -> FetchOutcome {
    FetchOutcome {
        failures: vec![
            DeskError::source_unavailable(SourceKind::LiveCache, "connection refused"),
            DeskError::source_unavailable(SourceKind::UnderlyingLtp, "connection refused"),
        ],
        ..Default::default()
    }
}

fn scheduler() -> RefreshScheduler {
    RefreshScheduler::new(nifty(), STRADDLE_WINDOW_SIZE, LotSizeResolver::default())
}

fn published(result: CycleResult) -> Arc<ChainView> {
    match result {
        CycleResult::Published(view) => view,
        other => panic!("expected a published view, got {:?}", other),
    }
}

// ============================================================================
// State machine
// ============================================================================

#[test]
fn test_initial_status() {
    let scheduler = scheduler();
    let status = scheduler.status();

    assert_eq!(status.state, RefreshState::Idle);
    assert_eq!(status.generation, 0);
    assert!(status.live);
    assert!(scheduler.view().is_none());
}

#[test]
fn test_trigger_while_in_flight_is_skipped() {
    let mut scheduler = scheduler();

    let ticket = scheduler.begin_cycle(Trigger::Tick).unwrap();
    assert_eq!(scheduler.state(), RefreshState::Loading);
    assert!(scheduler.begin_cycle(Trigger::Manual).is_none());
    assert!(scheduler.begin_cycle(Trigger::Tick).is_none());

    let view = published(scheduler.complete_cycle(&ticket, live_outcome(Some(24500))));

    assert_eq!(view.generation, 1);
    assert_eq!(scheduler.status().skipped_triggers, 2);
    assert_eq!(scheduler.state(), RefreshState::Ready);

    let next = scheduler.begin_cycle(Trigger::Tick).unwrap();
    assert_eq!(next.generation(), 2);
}

#[test]
fn test_result_after_teardown_is_discarded() {
    let mut scheduler = scheduler();
    let ticket = scheduler.begin_cycle(Trigger::Tick).unwrap();

    scheduler.teardown();
    let result = scheduler.complete_cycle(&ticket, live_outcome(Some(24500)));

    assert!(matches!(
        result,
        CycleResult::Discarded(DiscardReason::TornDown)
    ));
    assert!(scheduler.view().is_none());
    assert!(!scheduler.status().live);
    assert!(scheduler.begin_cycle(Trigger::Manual).is_none());
}

#[test]
fn test_result_for_old_selection_is_discarded() {
    let mut scheduler = scheduler();
    let ticket = scheduler.begin_cycle(Trigger::Tick).unwrap();

    let start_now = scheduler.select(ChainSelection::new("NIFTY BANK", "2025-10-28"));
    assert!(!start_now);

    let result = scheduler.complete_cycle(&ticket, live_outcome(Some(24500)));

    assert!(matches!(
        result,
        CycleResult::Discarded(DiscardReason::Superseded)
    ));
    assert!(scheduler.view().is_none());
    assert!(scheduler.take_pending());
    assert!(!scheduler.take_pending());

    let next = scheduler.begin_cycle(Trigger::Manual).unwrap();
    assert_eq!(next.selection().underlying, "BANKNIFTY");
    assert_eq!(next.epoch(), 1);
}

#[test]
fn test_unknown_ticket_is_discarded() {
    let mut scheduler = scheduler();
    let ticket = scheduler.begin_cycle(Trigger::Tick).unwrap();
    published(scheduler.complete_cycle(&ticket, live_outcome(Some(24500))));

    let replay = scheduler.complete_cycle(&ticket, live_outcome(Some(24500)));

    assert!(matches!(
        replay,
        CycleResult::Discarded(DiscardReason::NotInFlight)
    ));
}

#[test]
fn test_select_when_idle_starts_now() {
    let mut scheduler = scheduler();
    let ticket = scheduler.begin_cycle(Trigger::Tick).unwrap();
    published(scheduler.complete_cycle(&ticket, live_outcome(Some(24500))));

    assert!(!scheduler.select(nifty()));
    assert!(scheduler.view().is_some());

    assert!(scheduler.select(ChainSelection::new("NIFTY", "2025-11-25")));
    assert!(scheduler.view().is_none());
    assert_eq!(scheduler.state(), RefreshState::Idle);
    assert!(!scheduler.take_pending());
}

#[test]
fn test_center_signal_fires_once_across_refreshes() {
    let mut scheduler = scheduler();

    let signals: Vec<bool> = (0..10)
        .map(|i| {
            let ticket = scheduler.begin_cycle(Trigger::Tick).unwrap();
            let atm = 24500 + 50 * (i % 3);
            published(scheduler.complete_cycle(&ticket, live_outcome(Some(atm))))
                .window
                .should_center_viewport
        })
        .collect();

    assert_eq!(signals.iter().filter(|fired| **fired).count(), 1);
    assert!(signals[0]);
}

#[test]
fn test_selection_change_rearms_center_signal() {
    let mut scheduler = scheduler();
    let ticket = scheduler.begin_cycle(Trigger::Tick).unwrap();
    assert!(
        published(scheduler.complete_cycle(&ticket, live_outcome(Some(24500))))
            .window
            .should_center_viewport
    );

    scheduler.select(ChainSelection::new("NIFTY", "2025-11-25"));
    let ticket = scheduler.begin_cycle(Trigger::Manual).unwrap();

    assert!(
        published(scheduler.complete_cycle(&ticket, live_outcome(Some(24500))))
            .window
            .should_center_viewport
    );
}

#[test]
fn test_window_centers_on_atm() {
    let mut scheduler = scheduler();
    let ticket = scheduler.begin_cycle(Trigger::Tick).unwrap();

    let view = published(scheduler.complete_cycle(&ticket, live_outcome(Some(24500))));

    assert_eq!(view.atm_strike(), Strike::new(Decimal::from(24500)));
    assert_eq!(view.window.center_index, Some(10));
    assert_eq!(view.window.range(), 0..31);
    assert_eq!(view.window_rows().len(), 31);
}

#[test]
fn test_failed_cycle_keeps_stale_view() {
    let mut scheduler = scheduler();
    let ticket = scheduler.begin_cycle(Trigger::Tick).unwrap();
    let first = published(scheduler.complete_cycle(&ticket, live_outcome(Some(24500))));

    let ticket = scheduler.begin_cycle(Trigger::Tick).unwrap();
    let result = scheduler.complete_cycle(&ticket, failed_outcome());

    assert!(matches!(result, CycleResult::Failed { retained: true }));
    assert_eq!(scheduler.state(), RefreshState::Error);
    assert_eq!(scheduler.view().unwrap().generation, first.generation);
    let error = scheduler.status().last_error.unwrap();
    assert!(error.contains("live cache unavailable"));

    let ticket = scheduler.begin_cycle(Trigger::Tick).unwrap();
    published(scheduler.complete_cycle(&ticket, live_outcome(Some(24500))));
    assert_eq!(scheduler.state(), RefreshState::Ready);
    assert!(scheduler.status().last_error.is_none());
}

#[test]
fn test_first_cycle_failure_has_nothing_to_keep() {
    let mut scheduler = scheduler();
    let ticket = scheduler.begin_cycle(Trigger::Tick).unwrap();

    let result = scheduler.complete_cycle(&ticket, FetchOutcome::default());

    assert!(matches!(result, CycleResult::Failed { retained: false }));
    assert_eq!(scheduler.state(), RefreshState::Error);
    assert_eq!(
        scheduler.status().last_error.as_deref(),
        Some("no strike carries a usable quote")
    );
}

#[test]
fn test_cycle_without_atm_reuses_previous() {
    let mut scheduler = scheduler();
    let ticket = scheduler.begin_cycle(Trigger::Tick).unwrap();
    published(scheduler.complete_cycle(&ticket, live_outcome(Some(25000))));

    // CE-only rows: nothing trade-ready, so no ATM this cycle
    let ticket = scheduler.begin_cycle(Trigger::Tick).unwrap();
    let outcome = FetchOutcome {
        live: Some(LiveChain {
            rows: ladder_rows(50, 10.0, 0.0),
            ..Default::default()
        }),
        ..Default::default()
    };
    let view = published(scheduler.complete_cycle(&ticket, outcome));

    assert!(view.atm.is_none());
    assert_eq!(view.window.center, WindowCenter::Atm);
    assert_eq!(view.window.center_index, Some(20));
}

#[test]
fn test_without_any_atm_window_uses_median() {
    let mut scheduler = scheduler();
    let ticket = scheduler.begin_cycle(Trigger::Tick).unwrap();
    let outcome = FetchOutcome {
        live: Some(LiveChain {
            rows: ladder_rows(50, 0.0, 4.0),
            ..Default::default()
        }),
        ..Default::default()
    };

    let view = published(scheduler.complete_cycle(&ticket, outcome));

    assert_eq!(view.window.center, WindowCenter::GeometricMedian);
    assert_eq!(view.window.center_index, Some(25));
}

// ============================================================================
// Driver
// ============================================================================

/// Source whose live fetch blocks until a permit is released.
struct GatedSource {
    gate: Semaphore,
    calls: AtomicUsize,
    completed: AtomicUsize,
    selections: Mutex<Vec<ChainSelection>>,
}

impl GatedSource {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            selections: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn release(&self) {
        self.gate.add_permits(1);
    }
}

impl ChainSource for GatedSource {
    async fn live_chain(&self, selection: &ChainSelection) -> Result<LiveChain, DeskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.selections.lock().push(selection.clone());
        self.gate
            .acquire()
            .await
            .map_err(|e| DeskError::source_unavailable(SourceKind::LiveCache, e))?
            .forget();
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(LiveChain {
            atm_strike: Strike::new(Decimal::from(24500)),
            rows: ladder_rows(50, 10.0, 12.0),
            ..Default::default()
        })
    }

    async fn snapshot(
        &self,
        _selection: &ChainSelection,
        _underlying_ltp: f64,
    ) -> Result<RowMap, DeskError> {
        Ok(RowMap::new())
    }

    async fn underlying_ltp(&self, _underlying: &str) -> Result<f64, DeskError> {
        Ok(24500.0)
    }

    async fn expiries(&self, _underlying: &str) -> Result<Vec<String>, DeskError> {
        Ok(vec!["2025-10-28".to_string()])
    }
}

async fn settle() {
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

async fn wait_for_calls(source: &GatedSource, calls: usize) {
    while source.calls() < calls {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_manual_refresh_during_flight_starts_nothing() {
    let source = GatedSource::new();
    let handle = spawn_scheduler(source.clone(), scheduler(), Duration::from_secs(60));
    let mut views = handle.views();
    let status = handle.status();

    wait_for_calls(&source, 1).await;
    handle.refresh().await;
    handle.refresh().await;
    settle().await;
    assert_eq!(source.calls(), 1);
    assert_eq!(status.borrow().state, RefreshState::Loading);

    source.release();
    let view = views
        .wait_for(Option::is_some)
        .await
        .unwrap()
        .clone()
        .unwrap();

    assert_eq!(view.generation, 1);
    assert_eq!(source.calls(), 1);
    settle().await;
    assert_eq!(status.borrow().skipped_triggers, 2);
    assert_eq!(status.borrow().state, RefreshState::Ready);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_ticks_drive_cycles() {
    let source = GatedSource::new();
    source.gate.add_permits(10);
    let handle = spawn_scheduler(source.clone(), scheduler(), Duration::from_secs(1));
    let mut status = handle.status();

    status
        .wait_for(|status| status.generation >= 3)
        .await
        .unwrap();

    assert!(source.calls() >= 3);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_discards_in_flight_result() {
    let source = GatedSource::new();
    let handle = spawn_scheduler(source.clone(), scheduler(), Duration::from_secs(60));
    let views = handle.views();
    let status = handle.status();

    wait_for_calls(&source, 1).await;
    handle.shutdown().await;
    source.release();
    settle().await;

    assert!(views.borrow().is_none());
    assert!(!status.borrow().live);
    assert_eq!(status.borrow().generation, 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_aborts_in_flight_fetch() {
    let source = GatedSource::new();
    let handle = spawn_scheduler(source.clone(), scheduler(), Duration::from_secs(60));

    wait_for_calls(&source, 1).await;
    handle.shutdown().await;
    source.release();
    settle().await;

    assert_eq!(source.calls(), 1);
    assert_eq!(source.completed.load(Ordering::SeqCst), 0);
    assert_eq!(source.gate.available_permits(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_select_during_flight_queues_new_cycle() {
    let source = GatedSource::new();
    let handle = spawn_scheduler(source.clone(), scheduler(), Duration::from_secs(60));
    let mut views = handle.views();

    wait_for_calls(&source, 1).await;
    handle
        .select(ChainSelection::new("nifty bank", "2025-10-28"))
        .await;
    settle().await;
    source.release();
    wait_for_calls(&source, 2).await;
    source.release();

    let view = views
        .wait_for(Option::is_some)
        .await
        .unwrap()
        .clone()
        .unwrap();

    assert_eq!(view.chain.underlying, "BANKNIFTY");
    assert_eq!(view.generation, 2);
    let selections = source.selections.lock().clone();
    assert_eq!(selections[0].underlying, "NIFTY");
    assert_eq!(selections[1].underlying, "BANKNIFTY");

    handle.shutdown().await;
}
