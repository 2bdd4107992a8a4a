//! Error types for the chain resolution engine.

use crate::models::{OptionSide, Strike};


/// Which upstream feed an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Live option-chain cache.
    LiveCache,
    /// Snapshot builder.
    Snapshot,
    /// Underlying last traded price.
    UnderlyingLtp,
    /// Expiry list.
    Expiries,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LiveCache => write!(f, "live cache"),
            Self::Snapshot => write!(f, "snapshot builder"),
            Self::UnderlyingLtp => write!(f, "underlying LTP"),
            Self::Expiries => write!(f, "expiry list"),
        }
    }
}

/// Engine error types.
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    /// A feed failed or returned unusable data.
    #[error("{kind} unavailable: {reason}")]
    SourceUnavailable {
        /// Feed that failed.
        kind: SourceKind,
        /// Failure description.
        reason: String,
    },

    /// The requested side has no positive price in either feed.
    #[error("no usable {side} quote at strike {strike}")]
    NoUsableQuote {
        /// Strike price.
        strike: Strike,
        /// Requested side.
        side: OptionSide,
    },

    /// The futures row has no positive price.
    #[error("no usable futures quote for {underlying}")]
    NoUsableFuturesQuote {
        /// Underlying symbol.
        underlying: String,
    },

    /// A straddle was requested on a strike lacking one of its sides.
    #[error("strike {strike} is not trade-ready: straddle needs both CE and PE prices")]
    NotTradeReady {
        /// Strike price.
        strike: Strike,
    },
}

impl DeskError {
    /// Builds a `SourceUnavailable` error from any displayable cause.
    pub fn source_unavailable(kind: SourceKind, cause: impl std::fmt::Display) -> Self {
        Self::SourceUnavailable {
            kind,
            reason: cause.to_string(),
        }
    }

    /// Returns true for transient feed failures that the next tick retries.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}
