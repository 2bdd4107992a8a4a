//! HTTP client library for the option chain feed APIs.
//!
//! This crate provides a typed HTTP client for the read-only endpoints that
//! back the live option views: the live option-chain cache, the slower
//! snapshot builder, the underlying last traded price and the expiry list.
//!
//! # Example
//!
//! ```no_run
//! use chain_client::{ChainClient, ClientConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chain_client::Error> {
//!     let client = ChainClient::new(ClientConfig {
//!         base_url: "http://localhost:8080".into(),
//!         timeout: Duration::from_secs(5),
//!     })?;
//!
//!     let chain = client.get_live_chain("NIFTY", "2025-10-28").await?;
//!     println!("Strikes: {}", chain.strikes.len());
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;

pub use client::{ChainClient, ClientConfig};
pub use error::Error;
pub use types::*;
