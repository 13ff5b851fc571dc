//! Open command: enters a paper straddle at live Deribit quotes.

use anyhow::{bail, Result};
use clap::Args;
use rust_decimal::Decimal;

use gex_desk_core::instruments::currency_of;
use gex_desk_core::{option_instrument_name, OptionRight, PositionTerms, PricingMode};

use crate::context::DeskContext;

/// Arguments for the open command.
#[derive(Args, Debug, Clone)]
pub struct OpenPositionArgs {
    /// Underlying currency (e.g., "BTC", "ETH")
    #[arg(long)]
    pub currency: String,

    /// Expiry label as listed on Deribit (e.g., "27DEC24")
    #[arg(long)]
    pub expiry: String,

    /// Strike of both legs
    #[arg(long)]
    pub strike: Decimal,

    /// Call instrument (looked up on Deribit if omitted)
    #[arg(long)]
    pub call: Option<String>,

    /// Put instrument (looked up on Deribit if omitted)
    #[arg(long)]
    pub put: Option<String>,

    /// Contracts per leg
    #[arg(long, default_value = "1")]
    pub qty: Decimal,

    /// Informational target move in percent
    #[arg(long, default_value = "0")]
    pub target_pct: Decimal,

    /// Pricing mode: mark or mid (defaults to the account setting)
    #[arg(long)]
    pub pricing: Option<PricingMode>,

    /// Free-form note stored with the position
    #[arg(long)]
    pub note: Option<String>,
}

/// Resolves leg names: explicit arguments first, then the venue listing.
///
/// If the listing cannot be fetched, falls back to the conventional names.
async fn resolve_legs(
    ctx: &DeskContext,
    args: &OpenPositionArgs,
) -> Result<(Option<String>, Option<String>)> {
    let currency = args.currency.to_uppercase();

    for leg in [&args.call, &args.put].into_iter().flatten() {
        if currency_of(leg).map(str::to_uppercase).as_deref() != Some(currency.as_str()) {
            bail!("instrument {leg} does not belong to {currency}");
        }
    }

    if args.call.is_some() && args.put.is_some() {
        return Ok((args.call.clone(), args.put.clone()));
    }

    let (listed_call, listed_put) = match ctx
        .client
        .find_straddle_legs(&currency, &args.expiry, args.strike)
        .await
    {
        Ok(legs) => legs,
        Err(e) => {
            tracing::warn!(error = %e, "Instrument lookup failed, using conventional names");
            (
                Some(option_instrument_name(
                    &currency,
                    &args.expiry,
                    args.strike,
                    OptionRight::Call,
                )),
                Some(option_instrument_name(
                    &currency,
                    &args.expiry,
                    args.strike,
                    OptionRight::Put,
                )),
            )
        }
    };

    Ok((
        args.call.clone().or(listed_call),
        args.put.clone().or(listed_put),
    ))
}

/// Opens a straddle and prints it.
///
/// # Errors
/// Returns an error on invalid terms, duplicates or unavailable quotes.
pub async fn run_open_position(ctx: &DeskContext, args: OpenPositionArgs) -> Result<()> {
    let (call, put) = resolve_legs(ctx, &args).await?;

    let terms = PositionTerms {
        currency: args.currency.to_uppercase(),
        expiry: args.expiry.to_uppercase(),
        strike: args.strike,
        quantity: args.qty,
        target_pct: args.target_pct,
        pricing_mode: args.pricing.unwrap_or_else(|| ctx.desk.pricing_mode()),
        call_instrument: call,
        put_instrument: put,
        note: args.note.clone(),
    };

    let position = ctx.desk.open_position_live(terms).await?;

    println!("Opened {}", position.id);
    println!(
        "  {} {} {} x{} ({})",
        position.currency,
        position.expiry,
        position.strike.normalize(),
        position.quantity.normalize(),
        position.pricing_mode
    );
    println!("  call {}  {:.2}", position.legs.call, position.call_prem_usd);
    println!("  put  {}  {:.2}", position.legs.put, position.put_prem_usd);
    println!(
        "  total {:.2} at spot {}  breakeven {:.2} / {:.2}",
        position.total_cost_usd,
        position.entry_spot,
        position.breakeven_low(),
        position.breakeven_high()
    );

    let account = &ctx.config.account;
    if position.total_cost_usd > account.risk_per_trade_usd
        && account.risk_per_trade_usd > Decimal::ZERO
    {
        println!(
            "  cost exceeds risk per trade ({:.2})",
            account.risk_per_trade_usd
        );
    }
    Ok(())
}
