//! Integration test support for Option Chain Desk.
//!
//! Spawns an in-process mock of the feed APIs on an ephemeral port. Payloads
//! and failure switches live in [`FeedState`] and can be changed while a test
//! runs.

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use chain_client::{ChainClient, ClientConfig};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Mutable state behind the mock feed.
#[derive(Debug)]
pub struct FeedState {
    /// Live cache answers 503 when set.
    pub live_fails: AtomicBool,
    /// Snapshot builder answers 500 when set.
    pub snapshot_fails: AtomicBool,
    /// Live cache payload.
    pub live: Mutex<Value>,
    /// Snapshot builder payload.
    pub snapshot: Mutex<Value>,
    /// Underlying prices by symbol.
    pub ltp: Mutex<HashMap<String, f64>>,
    /// Expiry lists by underlying.
    pub expiries: Mutex<HashMap<String, Vec<String>>>,
    /// Query strings received by the snapshot builder.
    pub snapshot_queries: Mutex<Vec<HashMap<String, String>>>,
    /// Live cache requests served.
    pub live_hits: AtomicUsize,
    /// Expiry list requests served.
    pub expiry_hits: AtomicUsize,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            live_fails: AtomicBool::new(false),
            snapshot_fails: AtomicBool::new(false),
            live: Mutex::new(live_payload()),
            snapshot: Mutex::new(snapshot_payload()),
            ltp: Mutex::new(HashMap::from([("NIFTY".to_string(), 24512.3)])),
            expiries: Mutex::new(HashMap::from([(
                "NIFTY".to_string(),
                vec!["2025-10-28".to_string(), "2025-11-04".to_string()],
            )])),
            snapshot_queries: Mutex::new(Vec::new()),
            live_hits: AtomicUsize::new(0),
            expiry_hits: AtomicUsize::new(0),
        }
    }
}

impl FeedState {
    /// Switches the live cache between failing and serving.
    pub fn set_live_fails(&self, fails: bool) {
        self.live_fails.store(fails, Ordering::SeqCst);
    }

    /// Switches the snapshot builder between failing and serving.
    pub fn set_snapshot_fails(&self, fails: bool) {
        self.snapshot_fails.store(fails, Ordering::SeqCst);
    }

    /// Number of snapshot requests served or refused.
    #[must_use]
    pub fn snapshot_requests(&self) -> usize {
        self.snapshot_queries.lock().len()
    }
}

/// A running mock feed.
pub struct MockFeed {
    /// Shared state.
    pub state: Arc<FeedState>,
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl MockFeed {
    /// Starts a mock feed with the default payloads.
    ///
    /// # Errors
    /// Returns error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(FeedState::default()).await
    }

    /// Starts a mock feed with the given state.
    ///
    /// # Errors
    /// Returns error if the listener cannot be bound.
    pub async fn start_with(state: FeedState) -> std::io::Result<Self> {
        let state = Arc::new(state);
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = create_router(Arc::clone(&state));

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { state, addr, task })
    }

    /// Base URL of the mock feed.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Creates a client pointed at the mock feed.
    ///
    /// # Errors
    /// Returns error if client creation fails.
    pub fn client(&self) -> Result<ChainClient, chain_client::Error> {
        ChainClient::new(ClientConfig {
            base_url: self.base_url(),
            timeout: Duration::from_secs(5),
        })
    }
}

impl Drop for MockFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Default live cache payload: five NIFTY strikes, 24600 missing its CE.
#[must_use]
pub fn live_payload() -> Value {
    json!({
        "atm_strike": 24500.0,
        "strike_interval": 50.0,
        "lot_size": 75,
        "underlying_ltp": 24512.3,
        "strikes": {
            "24400": {"CE": {"ltp": 180.0, "bid": 179.5, "ask": 180.5}, "PE": {"ltp": 62.0}},
            "24450": {"CE": {"ltp": 140.0}, "PE": {"ltp": 78.0}},
            "24500": {"CE": {"ltp": 105.0}, "PE": {"ltp": 96.0}},
            "24550": {"CE": {"ltp": 76.0}, "PE": {"ltp": 118.0}},
            "24600": {"CE": {"ltp": 0.0}, "PE": {"ltp": 142.0}}
        }
    })
}

/// Default snapshot payload, mixing price aliases.
#[must_use]
pub fn snapshot_payload() -> Value {
    json!([
        {"strike": 24450.0, "ce": {"close": 139.0}, "pe": {"close": 77.5}},
        {"strike": 24500.0, "ce": {"ltp": 104.0}, "pe": {"last_price": 95.5}},
        {"strike": 24550.0, "ce": {"ltp": 75.0}, "pe": {"ltp": 117.0}},
        {"strike": 24600.0, "CE": {"close": 53.0}, "PE": {"ltp": 141.0}},
        {"strike": 24650.0, "ce": {"ltp": 35.0}, "pe": {"ltp": 170.0}}
    ])
}

/// Creates the mock feed router.
pub fn create_router(state: Arc<FeedState>) -> Router {
    Router::new()
        .route("/api/v1/option-chain/snapshot", get(snapshot))
        .route("/api/v1/option-chain/{underlying}/{expiry}", get(live_chain))
        .route("/api/v1/ltp/{symbol}", get(ltp))
        .route("/api/v1/expiries/{underlying}", get(expiries))
        .with_state(state)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn live_chain(
    State(state): State<Arc<FeedState>>,
    Path((_underlying, _expiry)): Path<(String, String)>,
) -> Response {
    state.live_hits.fetch_add(1, Ordering::SeqCst);
    if state.live_fails.load(Ordering::SeqCst) {
        return error(StatusCode::SERVICE_UNAVAILABLE, "live cache warming up");
    }
    Json(state.live.lock().clone()).into_response()
}

async fn snapshot(
    State(state): State<Arc<FeedState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.snapshot_queries.lock().push(params);
    if state.snapshot_fails.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "snapshot builder failed");
    }
    Json(state.snapshot.lock().clone()).into_response()
}

async fn ltp(State(state): State<Arc<FeedState>>, Path(symbol): Path<String>) -> Response {
    match state.ltp.lock().get(&symbol) {
        Some(ltp) => Json(json!({ "ltp": ltp })).into_response(),
        None => error(StatusCode::NOT_FOUND, "unknown symbol"),
    }
}

async fn expiries(
    State(state): State<Arc<FeedState>>,
    Path(underlying): Path<String>,
) -> Response {
    state.expiry_hits.fetch_add(1, Ordering::SeqCst);
    match state.expiries.lock().get(&underlying) {
        Some(expiries) => Json(json!({ "expiries": expiries })).into_response(),
        None => error(StatusCode::NOT_FOUND, "unknown underlying"),
    }
}
