//! At-the-money strike resolution.

use crate::models::{Chain, Strike, StrikeRow};
use serde::Serialize;

/// How the ATM strike was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AtmMethod {
    /// Taken verbatim from the live cache.
    Authoritative,
    /// Strike with the cheapest CE + PE straddle.
    MinStraddlePremium,
}

/// A resolved ATM strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AtmResolution {
    /// ATM strike.
    pub strike: Strike,
    /// Rule that produced it.
    pub method: AtmMethod,
}

/// Resolves the ATM strike of a chain.
///
/// The authoritative field wins. Otherwise the minimum straddle premium over
/// trade-ready rows is used. `None` means the chain is centerless.
#[must_use]
pub fn resolve_atm(chain: &Chain) -> Option<AtmResolution> {
    if let Some(strike) = chain.atm_strike {
        return Some(AtmResolution {
            strike,
            method: AtmMethod::Authoritative,
        });
    }

    min_straddle_strike(&chain.strikes).map(|strike| AtmResolution {
        strike,
        method: AtmMethod::MinStraddlePremium,
    })
}

/// Returns the strike with the lowest CE + PE premium among rows where both
/// sides are priced. Rows must be in ascending strike order; on equal
/// premiums the lowest strike wins.
#[must_use]
pub fn min_straddle_strike(rows: &[StrikeRow]) -> Option<Strike> {
    let mut best: Option<(Strike, f64)> = None;

    for row in rows {
        let Some(premium) = row.straddle_premium() else {
            continue;
        };
        match best {
            Some((_, lowest)) if premium >= lowest => {}
            _ => best = Some((row.strike, premium)),
        }
    }

    best.map(|(strike, _)| strike)
}
