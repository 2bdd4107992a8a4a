//! Periodic chain refresh with single-flight cycles and stale-result
//! rejection.
//!
//! [`RefreshScheduler`] is a synchronous state machine. It hands out a
//! [`CycleTicket`] when a cycle may start and decides, when the fetch comes
//! back, whether the result still applies. [`spawn_scheduler`] drives it from
//! a tokio task: a ticker and manual commands start cycles, fetches run in
//! spawned tasks, and published views go out on a `watch` channel.

use crate::chain::{
    AtmResolution, DisplayWindow, DisplayWindowSelector, LotSizeResolver, build_chain, resolve_atm,
};
use crate::models::{Chain, ChainSelection, Strike, StrikeRow};
use crate::source::{ChainSource, FetchOutcome, fetch_cycle};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[cfg(test)]
mod tests;

/// Lifecycle state of the refresh loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    /// No cycle has run yet for the current selection.
    Idle,
    /// A cycle is in flight.
    Loading,
    /// The last cycle published a view.
    Ready,
    /// The last cycle produced nothing displayable.
    Error,
}

/// What asked for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Periodic timer.
    Tick,
    /// Explicit refresh or selection change.
    Manual,
}

/// Identity of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleTicket {
    generation: u64,
    epoch: u64,
    selection: ChainSelection,
}

impl CycleTicket {
    /// Monotonic cycle number.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Selection epoch the cycle was started under.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Selection the cycle fetches.
    #[must_use]
    pub fn selection(&self) -> &ChainSelection {
        &self.selection
    }
}

/// Why a cycle result was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The scheduler was torn down.
    TornDown,
    /// The selection changed or a newer cycle already applied.
    Superseded,
    /// The ticket is not the one in flight.
    NotInFlight,
}

/// Outcome of applying a cycle result.
#[derive(Debug, Clone)]
pub enum CycleResult {
    /// A new view was published.
    Published(Arc<ChainView>),
    /// Nothing displayable came back.
    Failed {
        /// The previous view is still being shown.
        retained: bool,
    },
    /// The result was stale and ignored.
    Discarded(DiscardReason),
}

/// Immutable, fully resolved view of one chain.
///
/// `window.should_center_viewport` belongs to the cycle that produced this
/// view. Consumers should act on it only when `generation` changes.
#[derive(Debug, Clone, Serialize)]
pub struct ChainView {
    /// Cycle that produced the view.
    pub generation: u64,
    /// When the view was built.
    pub resolved_at: DateTime<Utc>,
    /// Reconciled chain.
    pub chain: Chain,
    /// ATM resolved this cycle, if any.
    pub atm: Option<AtmResolution>,
    /// Rows selected for rendering.
    pub window: DisplayWindow,
}

impl ChainView {
    /// ATM strike of this cycle.
    #[must_use]
    pub fn atm_strike(&self) -> Option<Strike> {
        self.atm.map(|atm| atm.strike)
    }

    /// Rows inside the display window.
    #[must_use]
    pub fn window_rows(&self) -> &[StrikeRow] {
        self.window.rows(&self.chain.strikes)
    }
}

/// Snapshot of the scheduler for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    /// Current state.
    pub state: RefreshState,
    /// Generation of the last applied cycle.
    pub generation: u64,
    /// Triggers dropped because a cycle was in flight.
    pub skipped_triggers: u64,
    /// Message of the last failed cycle.
    pub last_error: Option<String>,
    /// False after teardown.
    pub live: bool,
}

/// Refresh state machine for one chain view.
#[derive(Debug)]
pub struct RefreshScheduler {
    selection: ChainSelection,
    epoch: u64,
    state: RefreshState,
    next_generation: u64,
    in_flight: Option<CycleTicket>,
    last_applied: u64,
    live: bool,
    skipped_triggers: u64,
    last_atm: Option<Strike>,
    last_error: Option<String>,
    view: Option<Arc<ChainView>>,
    selector: DisplayWindowSelector,
    lot_sizes: LotSizeResolver,
    pending: bool,
}

impl RefreshScheduler {
    /// Creates an idle scheduler bound to a selection.
    #[must_use]
    pub fn new(selection: ChainSelection, window_size: usize, lot_sizes: LotSizeResolver) -> Self {
        Self {
            selection,
            epoch: 0,
            state: RefreshState::Idle,
            next_generation: 1,
            in_flight: None,
            last_applied: 0,
            live: true,
            skipped_triggers: 0,
            last_atm: None,
            last_error: None,
            view: None,
            selector: DisplayWindowSelector::new(window_size),
            lot_sizes,
            pending: false,
        }
    }

    /// Current selection.
    #[must_use]
    pub fn selection(&self) -> &ChainSelection {
        &self.selection
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> RefreshState {
        self.state
    }

    /// Last published view, kept across failed cycles.
    #[must_use]
    pub fn view(&self) -> Option<&Arc<ChainView>> {
        self.view.as_ref()
    }

    /// True while a cycle is in flight.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// True until [`RefreshScheduler::teardown`].
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Starts a cycle unless one is already in flight or the scheduler is
    /// torn down.
    pub fn begin_cycle(&mut self, trigger: Trigger) -> Option<CycleTicket> {
        if !self.live {
            return None;
        }
        if self.in_flight.is_some() {
            self.skipped_triggers += 1;
            debug!("Skipping {:?} trigger, cycle in flight", trigger);
            return None;
        }

        let ticket = CycleTicket {
            generation: self.next_generation,
            epoch: self.epoch,
            selection: self.selection.clone(),
        };
        self.next_generation += 1;
        self.in_flight = Some(ticket.clone());
        self.state = RefreshState::Loading;
        Some(ticket)
    }

    /// Applies the fetch result of a cycle.
    pub fn complete_cycle(&mut self, ticket: &CycleTicket, outcome: FetchOutcome) -> CycleResult {
        if !self.live {
            return CycleResult::Discarded(DiscardReason::TornDown);
        }
        if self.in_flight.as_ref() != Some(ticket) {
            return CycleResult::Discarded(DiscardReason::NotInFlight);
        }
        self.in_flight = None;

        if ticket.epoch != self.epoch || ticket.generation <= self.last_applied {
            debug!(
                "Discarding superseded cycle {} for {}",
                ticket.generation, ticket.selection
            );
            if self.state == RefreshState::Loading {
                self.state = self.settled_state();
            }
            return CycleResult::Discarded(DiscardReason::Superseded);
        }
        self.last_applied = ticket.generation;

        let chain = build_chain(
            &self.selection,
            outcome.live.as_ref(),
            outcome.snapshot.as_ref(),
            &self.lot_sizes,
        );

        if chain.display_valid_count() == 0 {
            let message = outcome
                .failure_summary()
                .unwrap_or_else(|| "no strike carries a usable quote".to_string());
            warn!("Refresh of {} failed: {}", self.selection, message);
            self.state = RefreshState::Error;
            self.last_error = Some(message);
            return CycleResult::Failed {
                retained: self.view.is_some(),
            };
        }

        let atm = resolve_atm(&chain);
        if let Some(resolved) = atm {
            self.last_atm = Some(resolved.strike);
        }
        let window = self.selector.select(&chain.strikes, self.last_atm);

        let view = Arc::new(ChainView {
            generation: ticket.generation,
            resolved_at: Utc::now(),
            chain,
            atm,
            window,
        });
        self.view = Some(Arc::clone(&view));
        self.state = RefreshState::Ready;
        self.last_error = None;
        CycleResult::Published(view)
    }

    /// Switches to another underlying or expiry.
    ///
    /// Returns true when a cycle can start right away; otherwise one is
    /// queued behind the in-flight cycle. Selecting the current selection is
    /// a no-op.
    pub fn select(&mut self, selection: ChainSelection) -> bool {
        if !self.live || selection == self.selection {
            return false;
        }

        info!("Switching chain view {} -> {}", self.selection, selection);
        self.selection = selection;
        self.epoch += 1;
        self.last_atm = None;
        self.last_error = None;
        self.view = None;
        self.selector.reset();

        if self.in_flight.is_some() {
            self.pending = true;
            false
        } else {
            self.state = RefreshState::Idle;
            true
        }
    }

    /// Returns and clears the queued selection-change cycle.
    pub fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    /// Stops the scheduler for good. Later results are discarded.
    pub fn teardown(&mut self) {
        self.live = false;
        self.pending = false;
        self.in_flight = None;
    }

    /// Status snapshot.
    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            state: self.state,
            generation: self.last_applied,
            skipped_triggers: self.skipped_triggers,
            last_error: self.last_error.clone(),
            live: self.live,
        }
    }

    fn settled_state(&self) -> RefreshState {
        match (&self.view, &self.last_error) {
            (Some(_), _) => RefreshState::Ready,
            (None, Some(_)) => RefreshState::Error,
            (None, None) => RefreshState::Idle,
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

enum Command {
    Refresh,
    Select(ChainSelection),
    Shutdown,
}

/// Handle to a running refresh loop.
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
    views: watch::Receiver<Option<Arc<ChainView>>>,
    status: watch::Receiver<SchedulerStatus>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Requests an immediate cycle. Skipped when one is in flight.
    pub async fn refresh(&self) {
        let _ = self.commands.send(Command::Refresh).await;
    }

    /// Switches the view to another underlying or expiry.
    pub async fn select(&self, selection: ChainSelection) {
        let _ = self.commands.send(Command::Select(selection)).await;
    }

    /// Subscribes to published views. `None` until the first view of the
    /// current selection.
    #[must_use]
    pub fn views(&self) -> watch::Receiver<Option<Arc<ChainView>>> {
        self.views.clone()
    }

    /// Subscribes to status changes.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.clone()
    }

    /// Tears the loop down and waits for it to exit.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown).await;
        if let Err(e) = self.task.await {
            warn!("Refresh loop ended abnormally: {}", e);
        }
    }
}

/// Spawns the refresh loop for `scheduler`, ticking every `period`.
///
/// The first tick fires immediately.
pub fn spawn_scheduler<S: ChainSource>(
    source: Arc<S>,
    scheduler: RefreshScheduler,
    period: Duration,
) -> SchedulerHandle {
    let (command_tx, command_rx) = mpsc::channel(32);
    let (views_tx, views_rx) = watch::channel(None);
    let (status_tx, status_rx) = watch::channel(scheduler.status());

    let task = tokio::spawn(async move {
        refresh_loop(source, scheduler, period, command_rx, views_tx, status_tx).await;
    });

    SchedulerHandle {
        commands: command_tx,
        views: views_rx,
        status: status_rx,
        task,
    }
}

async fn refresh_loop<S: ChainSource>(
    source: Arc<S>,
    mut scheduler: RefreshScheduler,
    period: Duration,
    mut commands: mpsc::Receiver<Command>,
    views: watch::Sender<Option<Arc<ChainView>>>,
    status: watch::Sender<SchedulerStatus>,
) {
    let (result_tx, mut results) = mpsc::channel::<(CycleTicket, FetchOutcome)>(4);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut fetch_task: Option<JoinHandle<()>> = None;

    info!(
        "Starting refresh loop for {} every {}ms",
        scheduler.selection(),
        period.as_millis()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(task) = start_cycle(&mut scheduler, &source, &result_tx, Trigger::Tick) {
                    fetch_task = Some(task);
                }
            }
            command = commands.recv() => match command {
                Some(Command::Refresh) => {
                    if let Some(task) = start_cycle(&mut scheduler, &source, &result_tx, Trigger::Manual) {
                        fetch_task = Some(task);
                    }
                }
                Some(Command::Select(selection)) => {
                    let start_now = scheduler.select(selection);
                    views.send_replace(scheduler.view().cloned());
                    if start_now {
                        if let Some(task) = start_cycle(&mut scheduler, &source, &result_tx, Trigger::Manual) {
                            fetch_task = Some(task);
                        }
                    }
                }
                Some(Command::Shutdown) | None => {
                    if let Some(task) = fetch_task.take() {
                        task.abort();
                    }
                    scheduler.teardown();
                    status.send_replace(scheduler.status());
                    info!("Refresh loop for {} stopped", scheduler.selection());
                    break;
                }
            },
            Some((ticket, outcome)) = results.recv() => {
                fetch_task = None;
                match scheduler.complete_cycle(&ticket, outcome) {
                    CycleResult::Published(view) => {
                        debug!(
                            "Published generation {} for {} ({} strikes)",
                            view.generation,
                            ticket.selection(),
                            view.chain.strikes.len()
                        );
                        views.send_replace(Some(view));
                    }
                    CycleResult::Failed { retained } => {
                        debug!("Cycle {} failed, stale view retained: {}", ticket.generation(), retained);
                    }
                    CycleResult::Discarded(reason) => {
                        debug!("Cycle {} discarded: {:?}", ticket.generation(), reason);
                    }
                }
                if scheduler.take_pending() {
                    fetch_task = start_cycle(&mut scheduler, &source, &result_tx, Trigger::Manual);
                }
            }
        }
        status.send_replace(scheduler.status());
    }
}

fn start_cycle<S: ChainSource>(
    scheduler: &mut RefreshScheduler,
    source: &Arc<S>,
    results: &mpsc::Sender<(CycleTicket, FetchOutcome)>,
    trigger: Trigger,
) -> Option<JoinHandle<()>> {
    let ticket = scheduler.begin_cycle(trigger)?;

    let source = Arc::clone(source);
    let results = results.clone();
    Some(tokio::spawn(async move {
        let outcome = fetch_cycle(source.as_ref(), ticket.selection()).await;
        // The loop may be gone by now; the result is dropped with the channel.
        let _ = results.send((ticket, outcome)).await;
    }))
}
