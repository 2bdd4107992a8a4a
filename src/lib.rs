//! # Option Chain Desk - Chain Resolution Engine
//!
//! Resolves a displayable option chain for one underlying and expiry from two
//! upstream feeds, centers a fixed-size display window on the at-the-money
//! strike, and builds order legs from the resolved rows.
//!
//! ## Key Features
//!
//! - **Two-feed reconciliation**: The live option-chain cache is
//!   authoritative; the snapshot builder fills sides the cache lacks.
//!
//! - **ATM resolution**: Authoritative ATM from the cache, else the strike
//!   with the cheapest CE + PE straddle.
//!
//! - **Display windowing**: 31 strikes around ATM, clamped at the chain
//!   edges, with a one-shot viewport centering signal.
//!
//! - **Single-flight refresh**: A periodic scheduler that never overlaps
//!   cycles and drops results that arrive after teardown or a selection
//!   change.
//!
//! - **Trade gating**: Straddles require both sides priced.
//!
//! ## Architecture
//!
//! ```text
//! ChainSource ──fetch_cycle──▶ FetchOutcome
//!                                   │
//!                      RefreshScheduler::complete_cycle
//!                                   │
//!          merge_quotes ─▶ resolve_atm ─▶ DisplayWindowSelector
//!                                   │
//!                           Arc<ChainView> ─▶ watch channel
//! ```
//!
//! ## Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | TTL cache and expiry list resolution |
//! | [`chain`] | Merging, ATM resolution, windowing, normalization, lot sizes |
//! | [`config`] | TOML configuration |
//! | [`error`] | Engine error types |
//! | [`legs`] | Order leg construction |
//! | [`models`] | Domain types |
//! | [`scheduler`] | Refresh state machine and driver task |
//! | [`source`] | Feed adapter and per-cycle fetch policy |
//!
//! ## Feeds
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/api/v1/option-chain/{underlying}/{expiry}` | Live option-chain cache |
//! | GET | `/api/v1/option-chain/snapshot` | Snapshot builder |
//! | GET | `/api/v1/ltp/{symbol}` | Underlying last traded price |
//! | GET | `/api/v1/expiries/{underlying}` | Expiry list |

pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod legs;
pub mod models;
pub mod scheduler;
pub mod source;
