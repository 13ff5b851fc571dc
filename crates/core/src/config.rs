use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::quote::PricingMode;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    pub account: AccountConfig,
    pub exit_policy: ExitPolicyConfig,
    pub poller: PollerConfig,
    pub ledger: LedgerConfig,
    pub deribit: DeribitConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Paper cash the equity curve starts from.
    pub starting_cash: Decimal,
    /// Risk budget per straddle. Shown against entry cost; never enforced.
    pub risk_per_trade_usd: Decimal,
    /// Pricing mode used for new entries.
    pub pricing_mode: PricingMode,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            starting_cash: Decimal::from(1000),
            risk_per_trade_usd: Decimal::from(150),
            pricing_mode: PricingMode::Mark,
        }
    }
}

impl AccountConfig {
    /// `cost` as a percentage of the per-trade risk budget, or `None` when no
    /// budget is set.
    #[must_use]
    pub fn risk_budget_pct(&self, cost: Decimal) -> Option<Decimal> {
        (self.risk_per_trade_usd > Decimal::ZERO)
            .then(|| cost / self.risk_per_trade_usd * Decimal::ONE_HUNDRED)
    }
}

/// Take-profit / stop-loss thresholds in settlement currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitPolicyConfig {
    /// Close when unrealized P&L reaches this gain. Zero or less disables.
    pub take_profit_usd: Decimal,
    /// Close when unrealized P&L falls to minus this magnitude. Zero disables.
    pub stop_loss_usd: Decimal,
    pub auto_enabled: bool,
    /// Snapshots older than this never trigger an automatic close.
    pub max_staleness_secs: u64,
}

impl Default for ExitPolicyConfig {
    fn default() -> Self {
        Self {
            take_profit_usd: Decimal::ZERO,
            stop_loss_usd: Decimal::ZERO,
            auto_enabled: false,
            max_staleness_secs: 10,
        }
    }
}

impl ExitPolicyConfig {
    #[must_use]
    pub fn max_staleness(&self) -> chrono::Duration {
        // Capped at one day.
        chrono::Duration::seconds(self.max_staleness_secs.min(86_400) as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub interval_ms: u64,
    /// Upper bound on positions refreshed in one tick.
    pub max_positions_per_tick: usize,
    /// Per-position budget for fetching both legs and spot.
    pub fetch_timeout_ms: u64,
    /// Refresh only the session's active position.
    pub focus_active_only: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2500,
            max_positions_per_tick: 12,
            fetch_timeout_ms: 6000,
            focus_active_only: false,
        }
    }
}

impl PollerConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Reject a second open straddle on the same currency/strike/expiry.
    pub prevent_duplicates: bool,
    pub store_path: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            prevent_duplicates: true,
            store_path: "data/paperbox.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeribitConfig {
    pub base_url: String,
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
}

impl Default for DeribitConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.deribit.com/api/v2".to_string(),
            requests_per_minute: 600,
            timeout_secs: 6,
        }
    }
}
