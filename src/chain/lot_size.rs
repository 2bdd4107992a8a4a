//! Authoritative lot size resolution.

use crate::chain::normalize_underlying;
use crate::config::LotSizeConfig;
use std::collections::HashMap;
use tracing::warn;

/// Exchange lot sizes used when neither the feed nor the config has one.
const BUILTIN_LOT_SIZES: &[(&str, u32)] = &[
    ("NIFTY", 75),
    ("BANKNIFTY", 35),
    ("FINNIFTY", 65),
    ("MIDCPNIFTY", 140),
    ("NIFTYNXT50", 25),
    ("SENSEX", 20),
    ("BANKEX", 30),
    ("CRUDEOIL", 100),
    ("NATURALGAS", 1250),
    ("GOLD", 100),
    ("SILVER", 30),
];

/// Resolves lot sizes with live-feed precedence over static configuration.
#[derive(Debug, Clone)]
pub struct LotSizeResolver {
    defaults: HashMap<String, u32>,
    fallback: u32,
}

impl LotSizeResolver {
    /// Creates a resolver from the built-in table overlaid with configuration.
    #[must_use]
    pub fn new(config: &LotSizeConfig) -> Self {
        let mut defaults: HashMap<String, u32> = BUILTIN_LOT_SIZES
            .iter()
            .map(|(symbol, lot_size)| ((*symbol).to_string(), *lot_size))
            .collect();

        for (symbol, lot_size) in &config.symbols {
            if *lot_size > 0 {
                defaults.insert(normalize_underlying(symbol), *lot_size);
            }
        }

        Self {
            defaults,
            fallback: config.fallback.max(1),
        }
    }

    /// Returns the static default for a symbol.
    #[must_use]
    pub fn default_for(&self, symbol: &str) -> u32 {
        self.defaults
            .get(&normalize_underlying(symbol))
            .copied()
            .unwrap_or(self.fallback)
    }

    /// Returns the live value when it is a positive count that fits a `u32`, else
    /// the static default.
    #[must_use]
    pub fn resolve(&self, symbol: &str, live: Option<f64>) -> u32 {
        match live {
            Some(value) if value.is_finite() && value >= 1.0 && value <= f64::from(u32::MAX) => {
                value.round() as u32
            }
            Some(value) if value > f64::from(u32::MAX) => {
                warn!("Ignoring out of range live lot size {} for {}", value, symbol);
                self.default_for(symbol)
            }
            _ => self.default_for(symbol),
        }
    }
}

impl Default for LotSizeResolver {
    fn default() -> Self {
        Self::new(&LotSizeConfig::default())
    }
}
