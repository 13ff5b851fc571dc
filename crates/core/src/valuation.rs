//! Mark-to-market valuation snapshots.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::position::{Position, PositionId};
use crate::pricing;
use crate::quote::LegQuote;

/// Valuation of one open position from quotes fetched in a single poll tick.
///
/// Both leg quotes always come from the same tick; snapshots are never
/// patched leg by leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationSnapshot {
    pub position_id: PositionId,
    pub fetched_at: DateTime<Utc>,
    pub call: LegQuote,
    pub put: LegQuote,
    pub spot: Decimal,
    pub call_value_usd: Decimal,
    pub put_value_usd: Decimal,
    pub value_usd: Decimal,
    pub pnl_usd: Decimal,
}

impl ValuationSnapshot {
    /// Values `position` with fresh leg quotes and spot, using the position's
    /// own pricing mode.
    #[must_use]
    pub fn compute(
        position: &Position,
        call: LegQuote,
        put: LegQuote,
        spot: Decimal,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let mode = position.pricing_mode;
        let call_value_usd = pricing::leg_value_usd(&call, mode, spot, position.quantity);
        let put_value_usd = pricing::leg_value_usd(&put, mode, spot, position.quantity);
        let value_usd = call_value_usd + put_value_usd;

        Self {
            position_id: position.id,
            fetched_at,
            call,
            put,
            spot,
            call_value_usd,
            put_value_usd,
            value_usd,
            pnl_usd: value_usd - position.total_cost_usd,
        }
    }

    /// Time since the quotes were fetched, floored at zero.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).max(Duration::zero())
    }

    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, max_staleness: Duration) -> bool {
        self.age(now) <= max_staleness
    }

    /// Unrealized P&L as a percentage of `cost`.
    #[must_use]
    pub fn pnl_pct(&self, cost: Decimal) -> Decimal {
        if cost.is_zero() {
            return Decimal::ZERO;
        }
        (self.pnl_usd / cost) * Decimal::ONE_HUNDRED
    }
}
