//! Venue instrument naming.
//!
//! Options follow `CUR-DDMMMYY-STRIKE-C|P` (e.g. `BTC-27DEC24-60000-C`) and
//! the underlying spot is read from `CUR-PERPETUAL`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Option right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionRight {
    Call,
    Put,
}

impl OptionRight {
    #[must_use]
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Call => "C",
            Self::Put => "P",
        }
    }
}

/// Builds the instrument name of one straddle leg.
#[must_use]
pub fn option_instrument_name(
    currency: &str,
    expiry: &str,
    strike: Decimal,
    right: OptionRight,
) -> String {
    format!(
        "{}-{}-{}-{}",
        currency.to_uppercase(),
        expiry.to_uppercase(),
        strike.normalize(),
        right.suffix()
    )
}

/// Perpetual used as the spot source for `currency`.
#[must_use]
pub fn perpetual_instrument_name(currency: &str) -> String {
    format!("{}-PERPETUAL", currency.to_uppercase())
}

/// Underlying currency prefix of an instrument name.
#[must_use]
pub fn currency_of(instrument: &str) -> Option<&str> {
    instrument.split('-').next().filter(|c| !c.is_empty())
}
