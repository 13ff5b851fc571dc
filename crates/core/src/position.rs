//! Paper straddle positions and their lifecycle.
//!
//! A position is created `Open` with a cost basis fixed at entry and moves to
//! `Closed` exactly once. Terms, legs and cost basis never change after
//! creation; closing only attaches a [`CloseRecord`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{DeskError, Result};
use crate::pricing;
use crate::quote::{LegQuote, PricingMode};
use crate::valuation::ValuationSnapshot;

/// Unique identifier of a paper position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(Uuid);

impl PositionId {
    #[allow(clippy::new_without_default)]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PositionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle state of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

impl PositionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        }
    }
}

/// What the user asks for when opening a straddle.
///
/// Leg instrument names are optional here so a request without one can be
/// rejected explicitly instead of being unrepresentable upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionTerms {
    pub currency: String,
    pub expiry: String,
    pub strike: Decimal,
    pub quantity: Decimal,
    /// Informational target move, in percent.
    pub target_pct: Decimal,
    pub pricing_mode: PricingMode,
    pub call_instrument: Option<String>,
    pub put_instrument: Option<String>,
    pub note: Option<String>,
}

impl PositionTerms {
    /// Terms for one contract per leg with explicit instrument names.
    pub fn new(
        currency: impl Into<String>,
        expiry: impl Into<String>,
        strike: Decimal,
        call_instrument: impl Into<String>,
        put_instrument: impl Into<String>,
    ) -> Self {
        Self {
            currency: currency.into(),
            expiry: expiry.into(),
            strike,
            quantity: Decimal::ONE,
            target_pct: Decimal::ZERO,
            pricing_mode: PricingMode::Mark,
            call_instrument: Some(call_instrument.into()),
            put_instrument: Some(put_instrument.into()),
            note: None,
        }
    }

    #[must_use]
    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = quantity;
        self
    }

    #[must_use]
    pub fn with_pricing_mode(mut self, mode: PricingMode) -> Self {
        self.pricing_mode = mode;
        self
    }

    #[must_use]
    pub fn with_target_pct(mut self, target_pct: Decimal) -> Self {
        self.target_pct = target_pct;
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Quotes and spot observed at the moment of entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryQuotes {
    pub call: LegQuote,
    pub put: LegQuote,
    pub spot: Decimal,
}

/// Instruments tracked for the two legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StraddleLegs {
    pub call: String,
    pub put: String,
}

/// Terminal data attached when a position closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRecord {
    pub closed_at: DateTime<Utc>,
    pub close_spot: Decimal,
    pub close_value_usd: Decimal,
    pub pnl_usd: Decimal,
    pub reason: String,
    pub basis: CloseMethod,
}

/// How the close value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseMethod {
    /// Live market value of both legs.
    MarkToMarket,
    /// Expiry-style intrinsic payoff at a manually supplied spot.
    Intrinsic,
}

/// Input to [`Position::close`].
#[derive(Debug, Clone, Copy)]
pub enum CloseBasis<'a> {
    /// Close at the value of a valuation snapshot of this position.
    Valuation(&'a ValuationSnapshot),
    /// Close at the straddle's intrinsic payoff for this spot.
    ///
    /// Ignores remaining time value; used only when live quotes are not
    /// obtainable.
    ManualSpot(Decimal),
}

/// One simulated straddle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub opened_at: DateTime<Utc>,
    pub currency: String,
    pub expiry: String,
    pub strike: Decimal,
    pub entry_spot: Decimal,
    pub target_pct: Decimal,
    pub pricing_mode: PricingMode,
    pub quantity: Decimal,
    pub legs: StraddleLegs,
    pub entry_call: LegQuote,
    pub entry_put: LegQuote,
    pub call_prem_usd: Decimal,
    pub put_prem_usd: Decimal,
    pub total_cost_usd: Decimal,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub close: Option<CloseRecord>,
}

fn required_leg(name: Option<String>, leg: &str) -> Result<String> {
    match name {
        Some(n) if !n.trim().is_empty() => Ok(n.trim().to_string()),
        _ => Err(DeskError::invalid_entry(format!(
            "missing {leg} leg instrument"
        ))),
    }
}

impl Position {
    /// Opens a straddle, fixing its cost basis from the entry quotes.
    ///
    /// # Errors
    /// Returns `InvalidEntry` if a leg instrument is missing, or if spot,
    /// quantity or strike is not positive.
    pub fn open(terms: PositionTerms, entry: EntryQuotes, now: DateTime<Utc>) -> Result<Self> {
        let call = required_leg(terms.call_instrument, "call")?;
        let put = required_leg(terms.put_instrument, "put")?;

        if entry.spot <= Decimal::ZERO {
            return Err(DeskError::invalid_entry(format!(
                "spot must be positive, got {}",
                entry.spot
            )));
        }
        if terms.quantity <= Decimal::ZERO {
            return Err(DeskError::invalid_entry(format!(
                "quantity must be positive, got {}",
                terms.quantity
            )));
        }
        if terms.strike <= Decimal::ZERO {
            return Err(DeskError::invalid_entry(format!(
                "strike must be positive, got {}",
                terms.strike
            )));
        }

        let mode = terms.pricing_mode;
        let call_prem_usd =
            pricing::leg_value_usd(&entry.call, mode, entry.spot, terms.quantity);
        let put_prem_usd = pricing::leg_value_usd(&entry.put, mode, entry.spot, terms.quantity);

        Ok(Self {
            id: PositionId::new(),
            opened_at: now,
            currency: terms.currency.to_uppercase(),
            expiry: terms.expiry,
            strike: terms.strike,
            entry_spot: entry.spot,
            target_pct: terms.target_pct,
            pricing_mode: mode,
            quantity: terms.quantity,
            legs: StraddleLegs { call, put },
            entry_call: entry.call,
            entry_put: entry.put,
            call_prem_usd,
            put_prem_usd,
            total_cost_usd: call_prem_usd + put_prem_usd,
            note: terms.note,
            close: None,
        })
    }

    /// Moves the position to `Closed`.
    ///
    /// Nothing is mutated when an error is returned.
    ///
    /// # Errors
    /// `AlreadyClosed` if the position is terminal; `InvalidClose` for a
    /// non-positive manual spot or a snapshot of another position.
    pub fn close(
        &mut self,
        reason: &str,
        basis: CloseBasis<'_>,
        now: DateTime<Utc>,
    ) -> Result<&CloseRecord> {
        if self.close.is_some() {
            return Err(DeskError::already_closed(self.id));
        }

        let (close_spot, close_value_usd, pnl_usd, method) = match basis {
            CloseBasis::Valuation(snapshot) => {
                if snapshot.position_id != self.id {
                    return Err(DeskError::invalid_close(format!(
                        "valuation for {} cannot close {}",
                        snapshot.position_id, self.id
                    )));
                }
                (
                    snapshot.spot,
                    snapshot.value_usd,
                    snapshot.pnl_usd,
                    CloseMethod::MarkToMarket,
                )
            }
            CloseBasis::ManualSpot(spot) => {
                if spot <= Decimal::ZERO {
                    return Err(DeskError::invalid_close(format!(
                        "close spot must be positive, got {spot}"
                    )));
                }
                let value = pricing::straddle_intrinsic(spot, self.strike) * self.quantity;
                (spot, value, value - self.total_cost_usd, CloseMethod::Intrinsic)
            }
        };

        if !reason.is_empty() {
            self.note = Some(match self.note.take() {
                Some(existing) if !existing.is_empty() => format!("{existing}; {reason}"),
                _ => reason.to_string(),
            });
        }

        Ok(&*self.close.insert(CloseRecord {
            closed_at: now,
            close_spot,
            close_value_usd,
            pnl_usd,
            reason: reason.to_string(),
            basis: method,
        }))
    }

    #[must_use]
    pub fn status(&self) -> PositionStatus {
        if self.close.is_some() {
            PositionStatus::Closed
        } else {
            PositionStatus::Open
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.close.is_none()
    }

    /// Realized P&L, set only once closed.
    #[must_use]
    pub fn realized_pnl(&self) -> Option<Decimal> {
        self.close.as_ref().map(|c| c.pnl_usd)
    }

    /// Cost of one contract of the straddle.
    #[must_use]
    pub fn cost_per_contract(&self) -> Decimal {
        if self.quantity.is_zero() {
            return self.total_cost_usd;
        }
        self.total_cost_usd / self.quantity
    }

    /// Lower breakeven at expiry: strike minus per-contract cost.
    #[must_use]
    pub fn breakeven_low(&self) -> Decimal {
        self.strike - self.cost_per_contract()
    }

    /// Upper breakeven at expiry: strike plus per-contract cost.
    #[must_use]
    pub fn breakeven_high(&self) -> Decimal {
        self.strike + self.cost_per_contract()
    }

    /// Key used for duplicate prevention.
    #[must_use]
    pub fn duplicate_key(&self) -> (&str, Decimal, &str) {
        (&self.currency, self.strike.normalize(), &self.expiry)
    }
}
