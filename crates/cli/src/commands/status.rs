//! Status command: positions, valuations and equity.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use rust_decimal::Decimal;

use gex_desk_core::{AccountConfig, Position};
use gex_desk_options_manager::ValuationStatus;

use crate::context::DeskContext;

/// Arguments for the status command.
#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Revalue open positions once before printing
    #[arg(long)]
    pub refresh: bool,

    /// Print position views and equity as JSON
    #[arg(long)]
    pub json: bool,
}

/// Prints the desk status.
///
/// # Errors
/// Returns an error if JSON encoding fails.
pub async fn run_status(ctx: &DeskContext, args: StatusArgs) -> Result<()> {
    if args.refresh {
        let report = ctx.desk.poll_once(Utc::now()).await;
        for (id, e) in &report.failed {
            tracing::warn!(position_id = %id, error = %e, "Could not revalue position");
        }
    }

    let now = Utc::now();

    if args.json {
        let views: Vec<_> = ctx
            .desk
            .list_open()
            .iter()
            .chain(ctx.desk.list_closed().iter())
            .filter_map(|p| ctx.desk.position_view(&p.id, now))
            .collect();
        let out = serde_json::json!({
            "equity": ctx.desk.get_equity(),
            "exit_policy": ctx.desk.exit_policy(),
            "risk_per_trade_usd": ctx.config.account.risk_per_trade_usd,
            "positions": views,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_report(ctx, now);
    Ok(())
}

fn format_status(status: &ValuationStatus) -> String {
    match status {
        ValuationStatus::Fresh { age_ms } => format!("fresh {:.1}s", *age_ms as f64 / 1000.0),
        ValuationStatus::Stale { age_ms, .. } => format!("STALE {:.0}s", *age_ms as f64 / 1000.0),
        ValuationStatus::Unknown { .. } => "-".to_string(),
    }
}

fn money(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn risk_label(account: &AccountConfig, cost: Decimal) -> String {
    account
        .risk_budget_pct(cost)
        .map_or_else(String::new, |pct| {
            format!(
                "  risk {}% of {}",
                pct.round_dp(0),
                money(account.risk_per_trade_usd)
            )
        })
}

fn print_open(ctx: &DeskContext, positions: &[Position], now: DateTime<Utc>) {
    let desk = &ctx.desk;
    println!(
        "{:<38} {:<22} {:>6} {:>10} {:>10} {:>10} {:>8} {:>12}",
        "Id", "Straddle", "Qty", "Cost", "Value", "PnL", "PnL %", "Quote"
    );
    println!("{}", "-".repeat(124));

    for pos in positions {
        let view = desk.position_view(&pos.id, now);
        let valuation = view.as_ref().and_then(|v| v.valuation.as_ref());
        let status = view
            .as_ref()
            .map(|v| format_status(&v.status))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<38} {:<22} {:>6} {:>10} {:>10} {:>10} {:>8} {:>12}",
            pos.id,
            format!("{} {} {}", pos.currency, pos.expiry, pos.strike.normalize()),
            pos.quantity.normalize(),
            money(pos.total_cost_usd),
            valuation.map_or("-".to_string(), |v| money(v.value_usd)),
            valuation.map_or("-".to_string(), |v| money(v.pnl_usd)),
            valuation.map_or("-".to_string(), |v| format!(
                "{:.1}",
                v.pnl_pct(pos.total_cost_usd).round_dp(1)
            )),
            status,
        );
        println!(
            "{:<38} breakeven {} / {}{}  {}",
            "",
            money(pos.breakeven_low()),
            money(pos.breakeven_high()),
            risk_label(&ctx.config.account, pos.total_cost_usd),
            pos.note.as_deref().unwrap_or("")
        );

        if let Some(ValuationStatus::Stale {
            last_error: Some(e),
            ..
        }
        | ValuationStatus::Unknown {
            last_error: Some(e),
        }) = view.as_ref().map(|v| &v.status)
        {
            println!("{:<38} last error: {}", "", e);
        }
    }
}

fn print_closed(positions: &[Position]) {
    println!(
        "{:<38} {:<22} {:>6} {:>10} {:>10} {:>10}  {}",
        "Id", "Straddle", "Qty", "Cost", "Close", "PnL", "Reason"
    );
    println!("{}", "-".repeat(124));

    for pos in positions {
        let Some(close) = &pos.close else { continue };
        println!(
            "{:<38} {:<22} {:>6} {:>10} {:>10} {:>10}  {} ({})",
            pos.id,
            format!("{} {} {}", pos.currency, pos.expiry, pos.strike.normalize()),
            pos.quantity.normalize(),
            money(pos.total_cost_usd),
            money(close.close_value_usd),
            money(close.pnl_usd),
            close.reason,
            close.closed_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
}

/// Prints open and closed positions followed by the equity summary.
pub fn print_report(ctx: &DeskContext, now: DateTime<Utc>) {
    let desk = &ctx.desk;
    let open = desk.list_open();
    let closed = desk.list_closed();
    let equity = desk.get_equity();
    let policy = desk.exit_policy();

    println!();
    println!("{}", "=".repeat(124));
    println!("PAPER DESK");
    println!("{}", "=".repeat(124));
    println!();

    println!("OPEN ({})", open.len());
    print_open(ctx, &open, now);
    println!();

    println!("CLOSED ({})", closed.len());
    print_closed(&closed);
    println!();

    println!("{}", "=".repeat(124));
    println!(
        "Starting cash: {}   Realized: {}   Equity: {}",
        money(equity.starting_cash),
        money(equity.realized_pnl),
        money(equity.equity)
    );
    println!(
        "Open cost: {}   Open value: {} ({} of {} valued)   Unrealized: {} ({:.1}%)",
        money(equity.open_cost),
        money(equity.open_value),
        equity.valued_positions,
        equity.open_count,
        money(equity.unrealized_pnl),
        equity.unrealized_pct.round_dp(1)
    );
    println!(
        "Exit policy: TP {}  SL {}  auto {}  max staleness {}s   Risk per trade: {}",
        policy.take_profit_usd,
        policy.stop_loss_usd,
        if policy.auto_enabled { "on" } else { "off" },
        policy.max_staleness_secs,
        money(ctx.config.account.risk_per_trade_usd)
    );
    if let Some(e) = desk.last_persist_error() {
        println!("WARNING: last ledger save failed: {e}");
    }
    println!("{}", "=".repeat(124));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn risk_label_shows_share_of_budget() {
        let account = AccountConfig::default();
        assert_eq!(risk_label(&account, dec!(1170)), "  risk 780% of 150.00");

        let unbudgeted = AccountConfig {
            risk_per_trade_usd: Decimal::ZERO,
            ..AccountConfig::default()
        };
        assert_eq!(risk_label(&unbudgeted, dec!(1170)), "");
    }
}
