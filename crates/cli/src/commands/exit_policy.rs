//! Exit-policy command.

use anyhow::Result;
use clap::Args;
use rust_decimal::Decimal;

use crate::context::DeskContext;

fn parse_switch(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(format!("expected on or off, got {other}")),
    }
}

/// Arguments for the exit-policy command. Omitted values keep their
/// current setting.
#[derive(Args, Debug, Clone)]
pub struct ExitPolicyArgs {
    /// Take-profit in USD (0 disables)
    #[arg(long)]
    pub tp: Option<Decimal>,

    /// Stop-loss magnitude in USD (0 disables)
    #[arg(long, allow_negative_numbers = true)]
    pub sl: Option<Decimal>,

    /// Automatic exits: on or off
    #[arg(long, value_parser = parse_switch)]
    pub auto: Option<bool>,
}

/// Updates and prints the exit policy.
///
/// # Errors
/// Returns an error if the ledger store cannot be locked or read.
pub fn run_exit_policy(ctx: &DeskContext, args: ExitPolicyArgs) -> Result<()> {
    let current = ctx.desk.exit_policy();
    let policy = ctx.desk.configure_exit_policy(
        args.tp.unwrap_or(current.take_profit_usd),
        args.sl.unwrap_or(current.stop_loss_usd),
        args.auto.unwrap_or(current.auto_enabled),
    )?;

    println!(
        "Exit policy: TP {}  SL {}  auto {}  max staleness {}s",
        policy.take_profit_usd,
        policy.stop_loss_usd,
        if policy.auto_enabled { "on" } else { "off" },
        policy.max_staleness_secs
    );
    Ok(())
}
