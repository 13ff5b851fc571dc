//! Quote records returned by the quote gateway.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which price of a leg quote the desk values premiums with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PricingMode {
    /// Venue mark price, falling back to mid.
    #[default]
    Mark,
    /// Bid/ask midpoint, falling back to mark.
    Mid,
}

impl PricingMode {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mark => "MARK",
            Self::Mid => "MID",
        }
    }
}

impl fmt::Display for PricingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PricingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MARK" => Ok(Self::Mark),
            "MID" => Ok(Self::Mid),
            other => Err(format!("unknown pricing mode: {other}")),
        }
    }
}

/// Snapshot of one option leg as quoted by the venue.
///
/// Prices are in underlying units. Any field may be absent; a venue with no
/// two-sided market simply reports no bid and/or ask.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegQuote {
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub mark: Option<Decimal>,
    /// Mark implied volatility, in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_interest: Option<Decimal>,
}

impl LegQuote {
    /// Creates a quote from bid, ask and mark.
    #[must_use]
    pub fn new(bid: Decimal, ask: Decimal, mark: Decimal) -> Self {
        Self {
            bid: Some(bid),
            ask: Some(ask),
            mark: Some(mark),
            iv: None,
            open_interest: None,
        }
    }

    /// Sets implied volatility and open interest.
    #[must_use]
    pub fn with_greeks(mut self, iv: Option<Decimal>, open_interest: Option<Decimal>) -> Self {
        self.iv = iv;
        self.open_interest = open_interest;
        self
    }
}

/// Spot reading for the underlying, taken from its perpetual.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotQuote {
    pub index_price: Option<Decimal>,
    pub last_price: Option<Decimal>,
}

impl SpotQuote {
    /// Index price if positive, then last price, then `fallback`.
    #[must_use]
    pub fn resolve(&self, fallback: Decimal) -> Decimal {
        self.index_price
            .filter(|p| p.is_sign_positive() && !p.is_zero())
            .or_else(|| {
                self.last_price
                    .filter(|p| p.is_sign_positive() && !p.is_zero())
            })
            .unwrap_or(fallback)
    }
}
