//! Order leg construction from resolved chain rows.
//!
//! Legs are plain data for the order-entry collaborator; nothing here places
//! orders.

use crate::chain::LotSizeResolver;
use crate::error::DeskError;
use crate::models::{Chain, FuturesRow, OptionSide, OrderAction, OrderLeg, Strike, StrikeRow};
use serde::{Deserialize, Serialize};

/// What to trade on a strike row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegRequest {
    /// One option side.
    Single(OptionSide),
    /// CE and PE at the same strike.
    Straddle,
}

/// Instrument symbol of an option: `{underlying}_{strike}_{CE|PE}`.
#[must_use]
pub fn option_symbol(underlying: &str, strike: Strike, side: OptionSide) -> String {
    format!("{}_{}_{}", underlying, strike, side)
}

/// Instrument symbol of a futures contract: `{underlying}_FUT`.
#[must_use]
pub fn futures_symbol(underlying: &str) -> String {
    format!("{}_FUT", underlying)
}

/// Builds order legs, filling in lot sizes.
#[derive(Debug, Clone, Copy)]
pub struct OrderLegBuilder<'a> {
    lot_sizes: &'a LotSizeResolver,
}

impl<'a> OrderLegBuilder<'a> {
    /// Creates a builder.
    #[must_use]
    pub fn new(lot_sizes: &'a LotSizeResolver) -> Self {
        Self { lot_sizes }
    }

    /// Builds the legs for a row of `chain`.
    ///
    /// # Errors
    ///
    /// - [`DeskError::NotTradeReady`] for a straddle on a row missing a side.
    /// - [`DeskError::NoUsableQuote`] for a single leg on a side without a
    ///   price.
    pub fn option_legs(
        &self,
        chain: &Chain,
        row: &StrikeRow,
        action: OrderAction,
        request: LegRequest,
    ) -> Result<Vec<OrderLeg>, DeskError> {
        let sides: &[OptionSide] = match request {
            LegRequest::Straddle => {
                if !row.is_trade_ready() {
                    return Err(DeskError::NotTradeReady { strike: row.strike });
                }
                &[OptionSide::Ce, OptionSide::Pe]
            }
            LegRequest::Single(OptionSide::Ce) => &[OptionSide::Ce],
            LegRequest::Single(OptionSide::Pe) => &[OptionSide::Pe],
        };

        let lot_size = self.lot_size(chain.lot_size, &chain.underlying);
        sides
            .iter()
            .map(|side| {
                let price = row
                    .side(*side)
                    .price()
                    .ok_or(DeskError::NoUsableQuote {
                        strike: row.strike,
                        side: *side,
                    })?;
                Ok(OrderLeg {
                    symbol: option_symbol(&chain.underlying, row.strike, *side),
                    side: Some(*side),
                    action,
                    price,
                    lot_size,
                    underlying: chain.underlying.clone(),
                    expiry: chain.expiry.clone(),
                })
            })
            .collect()
    }

    /// Builds the single leg of a futures row.
    ///
    /// # Errors
    ///
    /// [`DeskError::NoUsableFuturesQuote`] when the row has no price.
    pub fn futures_leg(&self, row: &FuturesRow, action: OrderAction) -> Result<OrderLeg, DeskError> {
        if !row.last_traded_price.is_finite() || row.last_traded_price <= 0.0 {
            return Err(DeskError::NoUsableFuturesQuote {
                underlying: row.underlying.clone(),
            });
        }

        Ok(OrderLeg {
            symbol: futures_symbol(&row.underlying),
            side: None,
            action,
            price: row.last_traded_price,
            lot_size: self.lot_size(row.lot_size.unwrap_or(0), &row.underlying),
            underlying: row.underlying.clone(),
            expiry: row.expiry.clone(),
        })
    }

    fn lot_size(&self, reported: u32, underlying: &str) -> u32 {
        if reported > 0 {
            reported
        } else {
            self.lot_sizes.default_for(underlying)
        }
    }
}
