//! Deribit public API payloads.

use gex_desk_core::{LegQuote, SpotQuote};
use rust_decimal::Decimal;
use serde::Deserialize;

/// JSON-RPC envelope wrapping every public response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RpcEnvelope<T> {
    pub result: Option<T>,
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

/// `public/ticker` result for options and perpetuals.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ticker {
    pub instrument_name: String,
    #[serde(default)]
    pub best_bid_price: Option<f64>,
    #[serde(default)]
    pub best_ask_price: Option<f64>,
    #[serde(default)]
    pub mark_price: Option<f64>,
    #[serde(default)]
    pub mark_iv: Option<f64>,
    #[serde(default)]
    pub open_interest: Option<f64>,
    #[serde(default)]
    pub index_price: Option<f64>,
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub underlying_price: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Converts a venue float, treating NaN, infinities and zero as absent.
fn decimal(value: Option<f64>) -> Option<Decimal> {
    value
        .filter(|v| v.is_finite() && *v != 0.0)
        .and_then(|v| Decimal::try_from(v).ok())
}

impl Ticker {
    /// Leg quote in underlying units.
    #[must_use]
    pub fn to_leg_quote(&self) -> LegQuote {
        LegQuote {
            bid: decimal(self.best_bid_price),
            ask: decimal(self.best_ask_price),
            mark: decimal(self.mark_price),
            iv: decimal(self.mark_iv),
            open_interest: decimal(self.open_interest),
        }
    }

    /// Spot reading from a perpetual ticker.
    #[must_use]
    pub fn to_spot_quote(&self) -> SpotQuote {
        SpotQuote {
            index_price: decimal(self.index_price),
            last_price: decimal(self.last_price),
        }
    }
}

/// `public/get_instruments` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Instrument {
    pub instrument_name: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub option_type: Option<String>,
    #[serde(default)]
    pub strike: Option<f64>,
    #[serde(default)]
    pub expiration_timestamp: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl Instrument {
    /// Expiry label as embedded in the instrument name (`27DEC24`).
    #[must_use]
    pub fn expiry_label(&self) -> Option<&str> {
        self.instrument_name.split('-').nth(1)
    }

    #[must_use]
    pub fn strike_decimal(&self) -> Option<Decimal> {
        self.strike.and_then(|s| Decimal::try_from(s).ok())
    }

    #[must_use]
    pub fn is_call(&self) -> bool {
        self.option_type.as_deref() == Some("call")
    }

    #[must_use]
    pub fn is_put(&self) -> bool {
        self.option_type.as_deref() == Some("put")
    }
}
