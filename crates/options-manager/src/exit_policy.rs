//! Take-profit / stop-loss rules for open straddles.
//!
//! Evaluation is pure: it looks at one position, its latest snapshot and the
//! clock, and never touches the ledger. The desk applies the verdicts.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gex_desk_core::{ExitPolicyConfig, Position, ValuationSnapshot};

/// Which threshold fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitTrigger {
    TakeProfit { threshold: Decimal },
    StopLoss { threshold: Decimal },
}

impl ExitTrigger {
    /// Reason recorded in the position note, e.g. `auto:TP 50`.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::TakeProfit { threshold } => format!("auto:TP {}", threshold.normalize()),
            Self::StopLoss { threshold } => format!("auto:SL {}", threshold.normalize()),
        }
    }
}

/// Result of evaluating one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitVerdict {
    /// Close the position at its snapshot.
    Close(ExitTrigger),
    /// Fresh snapshot, no threshold reached.
    Hold,
    /// Auto-exit is off or both thresholds are disabled.
    Disabled,
    /// Position is already closed.
    NotOpen,
    /// Nothing has been valued yet.
    NoSnapshot,
    /// A threshold may be crossed but the snapshot is too old to act on.
    StaleSnapshot { age: Duration },
}

/// Take-profit threshold if enabled.
fn take_profit(policy: &ExitPolicyConfig) -> Option<Decimal> {
    (policy.take_profit_usd > Decimal::ZERO).then_some(policy.take_profit_usd)
}

/// Stop-loss magnitude if enabled; the sign of the configured value is ignored.
fn stop_loss(policy: &ExitPolicyConfig) -> Option<Decimal> {
    let sl = policy.stop_loss_usd.abs();
    (sl > Decimal::ZERO).then_some(sl)
}

/// Returns true if the policy can ever close anything.
#[must_use]
pub fn is_active(policy: &ExitPolicyConfig) -> bool {
    policy.auto_enabled && (take_profit(policy).is_some() || stop_loss(policy).is_some())
}

/// Evaluates the exit rules for one position.
///
/// The staleness gate is applied before the thresholds: a snapshot older than
/// `max_staleness` never closes anything.
#[must_use]
pub fn evaluate(
    policy: &ExitPolicyConfig,
    position: &Position,
    snapshot: Option<&ValuationSnapshot>,
    now: DateTime<Utc>,
) -> ExitVerdict {
    if !is_active(policy) {
        return ExitVerdict::Disabled;
    }
    if !position.is_open() {
        return ExitVerdict::NotOpen;
    }
    let Some(snapshot) = snapshot.filter(|s| s.position_id == position.id) else {
        return ExitVerdict::NoSnapshot;
    };

    let age = snapshot.age(now);
    if age > policy.max_staleness() {
        return ExitVerdict::StaleSnapshot { age };
    }

    let pnl = snapshot.pnl_usd;

    if let Some(tp) = take_profit(policy) {
        if pnl >= tp {
            return ExitVerdict::Close(ExitTrigger::TakeProfit { threshold: tp });
        }
    }

    if let Some(sl) = stop_loss(policy) {
        if pnl <= -sl {
            return ExitVerdict::Close(ExitTrigger::StopLoss { threshold: sl });
        }
    }

    ExitVerdict::Hold
}

#[cfg(test)]
mod tests {
    use super::*;
    use gex_desk_core::{EntryQuotes, LegQuote, PositionTerms};
    use rust_decimal_macros::dec;

    fn policy(tp: Decimal, sl: Decimal, auto: bool) -> ExitPolicyConfig {
        ExitPolicyConfig {
            take_profit_usd: tp,
            stop_loss_usd: sl,
            auto_enabled: auto,
            max_staleness_secs: 10,
        }
    }

    fn position() -> Position {
        Position::open(
            PositionTerms::new(
                "BTC",
                "27DEC24",
                dec!(60000),
                "BTC-27DEC24-60000-C",
                "BTC-27DEC24-60000-P",
            ),
            EntryQuotes {
                call: LegQuote::new(dec!(0.01), dec!(0.012), dec!(0.011)),
                put: LegQuote::new(dec!(0.008), dec!(0.009), dec!(0.0085)),
                spot: dec!(60000),
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn snapshot_with_pnl(pos: &Position, pnl: Decimal, at: DateTime<Utc>) -> ValuationSnapshot {
        // Scenario B quotes give value 1250; shift the cost to hit the wanted pnl.
        let mut snap = ValuationSnapshot::compute(
            pos,
            LegQuote::new(dec!(0.013), dec!(0.015), dec!(0.014)),
            LegQuote::new(dec!(0.010), dec!(0.012), dec!(0.011)),
            dec!(50000),
            at,
        );
        snap.pnl_usd = pnl;
        snap
    }

    #[test]
    fn take_profit_fires_on_fresh_snapshot() {
        let pos = position();
        let now = Utc::now();
        let snap = snapshot_with_pnl(&pos, dec!(80), now);
        let verdict = evaluate(&policy(dec!(50), dec!(100), true), &pos, Some(&snap), now);
        assert_eq!(
            verdict,
            ExitVerdict::Close(ExitTrigger::TakeProfit {
                threshold: dec!(50)
            })
        );
    }

    #[test]
    fn stale_snapshot_suppresses_close() {
        let pos = position();
        let now = Utc::now();
        let snap = snapshot_with_pnl(&pos, dec!(80), now - Duration::seconds(12));
        let verdict = evaluate(&policy(dec!(50), dec!(100), true), &pos, Some(&snap), now);
        assert_eq!(
            verdict,
            ExitVerdict::StaleSnapshot {
                age: Duration::seconds(12)
            }
        );
    }

    #[test]
    fn snapshot_at_staleness_boundary_is_fresh() {
        let pos = position();
        let now = Utc::now();
        let snap = snapshot_with_pnl(&pos, dec!(80), now - Duration::seconds(10));
        let verdict = evaluate(&policy(dec!(50), dec!(100), true), &pos, Some(&snap), now);
        assert!(matches!(verdict, ExitVerdict::Close(_)));
    }

    #[test]
    fn stop_loss_uses_magnitude() {
        let pos = position();
        let now = Utc::now();
        let snap = snapshot_with_pnl(&pos, dec!(-100), now);

        for sl in [dec!(100), dec!(-100)] {
            let verdict = evaluate(&policy(dec!(0), sl, true), &pos, Some(&snap), now);
            assert_eq!(
                verdict,
                ExitVerdict::Close(ExitTrigger::StopLoss {
                    threshold: dec!(100)
                })
            );
        }
    }

    #[test]
    fn hold_between_thresholds() {
        let pos = position();
        let now = Utc::now();
        let snap = snapshot_with_pnl(&pos, dec!(20), now);
        let verdict = evaluate(&policy(dec!(50), dec!(100), true), &pos, Some(&snap), now);
        assert_eq!(verdict, ExitVerdict::Hold);
    }

    #[test]
    fn disabled_policies() {
        let pos = position();
        let now = Utc::now();
        let snap = snapshot_with_pnl(&pos, dec!(500), now);

        let off = evaluate(&policy(dec!(50), dec!(100), false), &pos, Some(&snap), now);
        assert_eq!(off, ExitVerdict::Disabled);

        let zeroes = evaluate(&policy(dec!(0), dec!(0), true), &pos, Some(&snap), now);
        assert_eq!(zeroes, ExitVerdict::Disabled);
    }

    #[test]
    fn no_snapshot_no_close() {
        let pos = position();
        let verdict = evaluate(&policy(dec!(50), dec!(100), true), &pos, None, Utc::now());
        assert_eq!(verdict, ExitVerdict::NoSnapshot);
    }

    #[test]
    fn trigger_reason_format() {
        let tp = ExitTrigger::TakeProfit {
            threshold: dec!(50.00),
        };
        assert_eq!(tp.reason(), "auto:TP 50");
        let sl = ExitTrigger::StopLoss {
            threshold: dec!(100),
        };
        assert_eq!(sl.reason(), "auto:SL 100");
    }
}
