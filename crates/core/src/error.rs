//! Error types for the paper desk.
//!
//! Structural errors (`InvalidEntry`, `InvalidClose`, `AlreadyClosed`,
//! `PositionNotFound`, `DuplicatePosition`) are returned synchronously to the caller and never
//! leave the ledger partially mutated. `QuoteUnavailable` is contained per
//! position and per poll tick.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::position::PositionId;

/// Errors that can occur while operating the paper desk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeskError {
    /// Entry rejected: missing leg, non-positive spot or quantity.
    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    /// Close attempted on a position that is already closed.
    #[error("position already closed: {id}")]
    AlreadyClosed {
        /// The closed position.
        id: PositionId,
    },

    /// Close rejected: non-positive manual spot or mismatched valuation.
    #[error("invalid close: {0}")]
    InvalidClose(String),

    /// No position with this id exists in the ledger.
    #[error("position not found: {id}")]
    PositionNotFound {
        /// The unknown id.
        id: PositionId,
    },

    /// An open straddle already exists for this currency/strike/expiry.
    #[error("open position already exists for {currency} {strike} {expiry}")]
    DuplicatePosition {
        /// Underlying currency.
        currency: String,
        /// Strike price.
        strike: Decimal,
        /// Expiry label.
        expiry: String,
    },

    /// A quote for one of the instruments could not be fetched.
    #[error("quote unavailable for {instrument}: {reason}")]
    QuoteUnavailable {
        /// Instrument that failed.
        instrument: String,
        /// Underlying failure.
        reason: String,
    },

    /// Ledger could not be loaded or saved.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl DeskError {
    /// Creates an invalid entry error.
    pub fn invalid_entry(reason: impl Into<String>) -> Self {
        Self::InvalidEntry(reason.into())
    }

    /// Creates an invalid close error.
    pub fn invalid_close(reason: impl Into<String>) -> Self {
        Self::InvalidClose(reason.into())
    }

    /// Creates an already closed error.
    #[must_use]
    pub fn already_closed(id: PositionId) -> Self {
        Self::AlreadyClosed { id }
    }

    /// Creates a position not found error.
    #[must_use]
    pub fn position_not_found(id: PositionId) -> Self {
        Self::PositionNotFound { id }
    }

    /// Creates a duplicate position error.
    pub fn duplicate_position(
        currency: impl Into<String>,
        strike: Decimal,
        expiry: impl Into<String>,
    ) -> Self {
        Self::DuplicatePosition {
            currency: currency.into(),
            strike,
            expiry: expiry.into(),
        }
    }

    /// Creates a quote unavailable error.
    pub fn quote_unavailable(instrument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::QuoteUnavailable {
            instrument: instrument.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for errors the hosting UI must surface to the user.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidEntry(_)
                | Self::InvalidClose(_)
                | Self::AlreadyClosed { .. }
                | Self::PositionNotFound { .. }
                | Self::DuplicatePosition { .. }
        )
    }
}

/// Result type alias for desk operations.
pub type Result<T> = std::result::Result<T, DeskError>;
