//! Realized equity and unrealized exposure reporting.
//!
//! Equity moves only when a position closes. Unrealized P&L of open positions
//! is reported next to it and never added in.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::position::{Position, PositionId};
use crate::valuation::ValuationSnapshot;

/// Sum of realized P&L over closed positions.
#[must_use]
pub fn realized_pnl<'a>(positions: impl IntoIterator<Item = &'a Position>) -> Decimal {
    positions
        .into_iter()
        .filter_map(Position::realized_pnl)
        .sum()
}

/// Starting cash plus realized P&L.
#[must_use]
pub fn equity<'a>(
    starting_cash: Decimal,
    positions: impl IntoIterator<Item = &'a Position>,
) -> Decimal {
    starting_cash + realized_pnl(positions)
}

/// Account summary shown next to the position lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquityReport {
    pub starting_cash: Decimal,
    pub realized_pnl: Decimal,
    pub equity: Decimal,
    pub open_count: usize,
    pub closed_count: usize,
    /// Entry cost of all open positions.
    pub open_cost: Decimal,
    /// Current value of open positions that have a snapshot.
    pub open_value: Decimal,
    /// Unrealized P&L of open positions that have a snapshot.
    pub unrealized_pnl: Decimal,
    /// `unrealized_pnl` relative to the cost of the valued positions.
    pub unrealized_pct: Decimal,
    /// Open positions that contributed to `open_value`.
    pub valued_positions: usize,
}

impl EquityReport {
    /// Builds the report from ledger contents and the latest snapshots.
    #[must_use]
    pub fn compute<'v, F>(starting_cash: Decimal, positions: &[Position], valuation: F) -> Self
    where
        F: Fn(&PositionId) -> Option<&'v ValuationSnapshot>,
    {
        let mut report = Self {
            starting_cash,
            realized_pnl: Decimal::ZERO,
            equity: starting_cash,
            open_count: 0,
            closed_count: 0,
            open_cost: Decimal::ZERO,
            open_value: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            unrealized_pct: Decimal::ZERO,
            valued_positions: 0,
        };

        let mut valued_cost = Decimal::ZERO;

        for pos in positions {
            match pos.realized_pnl() {
                Some(pnl) => {
                    report.closed_count += 1;
                    report.realized_pnl += pnl;
                }
                None => {
                    report.open_count += 1;
                    report.open_cost += pos.total_cost_usd;
                    if let Some(snap) = valuation(&pos.id) {
                        report.valued_positions += 1;
                        report.open_value += snap.value_usd;
                        report.unrealized_pnl += snap.pnl_usd;
                        valued_cost += pos.total_cost_usd;
                    }
                }
            }
        }

        report.equity = starting_cash + report.realized_pnl;
        if !valued_cost.is_zero() {
            report.unrealized_pct = (report.unrealized_pnl / valued_cost) * Decimal::ONE_HUNDRED;
        }

        report
    }
}
