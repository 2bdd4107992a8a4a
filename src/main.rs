//! Option Chain Desk
//!
//! Follows the option chain of one underlying and logs the display window
//! around the ATM strike on every refresh.

use anyhow::Context;
use chain_client::ChainClient;
use option_chain_desk::cache::ExpiryResolver;
use option_chain_desk::chain::LotSizeResolver;
use option_chain_desk::config::Config;
use option_chain_desk::models::ChainSelection;
use option_chain_desk::scheduler::{RefreshScheduler, spawn_scheduler};
use option_chain_desk::source::HttpChainSource;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,option_chain_desk=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::var("DESK_CONFIG") {
        Ok(path) => {
            info!("Loading configuration from {}", path);
            Config::load(&path)?
        }
        Err(_) => Config::default(),
    };

    let mut args = std::env::args().skip(1);
    let underlying = args.next().unwrap_or_else(|| "NIFTY".to_string());

    let client = ChainClient::new(config.client.to_client_config())?;
    info!("Using feed at {}", client.base_url());
    let source = Arc::new(HttpChainSource::new(client));

    let expiry = match args.next() {
        Some(expiry) => expiry,
        None => {
            let expiries = ExpiryResolver::new(Arc::clone(&source), config.cache.expiry_ttl());
            expiries
                .nearest(&underlying)
                .await?
                .with_context(|| format!("no expiries listed for {}", underlying))?
        }
    };

    let selection = ChainSelection::new(&underlying, &expiry);
    info!("Following option chain {}", selection);

    let scheduler = RefreshScheduler::new(
        selection,
        config.display.window_size,
        LotSizeResolver::new(&config.lot_sizes),
    );
    let handle = spawn_scheduler(source, scheduler, config.refresh.interval());
    let mut views = handle.views();

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    warn!("Refresh loop exited");
                    break;
                }
                let Some(view) = views.borrow_and_update().clone() else {
                    continue;
                };
                let rows = view.window_rows();
                info!(
                    "Generation {}: ATM {} | {} of {} strikes shown ({}..{}) | lot size {}",
                    view.generation,
                    view.atm_strike()
                        .map_or_else(|| "undefined".to_string(), |strike| strike.to_string()),
                    rows.len(),
                    view.chain.strikes.len(),
                    rows.first().map(|row| row.strike.to_string()).unwrap_or_default(),
                    rows.last().map(|row| row.strike.to_string()).unwrap_or_default(),
                    view.chain.lot_size,
                );
                if view.window.should_center_viewport {
                    info!("Centering viewport on row {:?}", view.window.center_index);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
