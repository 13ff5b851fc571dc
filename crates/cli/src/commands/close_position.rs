//! Close command.

use anyhow::Result;
use clap::Args;
use rust_decimal::Decimal;

use gex_desk_core::{CloseMethod, PositionId};

use crate::context::DeskContext;

/// Arguments for the close command.
#[derive(Args, Debug, Clone)]
pub struct ClosePositionArgs {
    /// Position id
    pub id: PositionId,

    /// Close at intrinsic payoff for this spot instead of live quotes
    #[arg(long)]
    pub spot: Option<Decimal>,

    /// Reason appended to the position note
    #[arg(long, default_value = "manual")]
    pub reason: String,
}

/// Closes a position and prints the realized result.
///
/// # Errors
/// Returns an error if the position is unknown, already closed, or cannot
/// be valued.
pub async fn run_close_position(ctx: &DeskContext, args: ClosePositionArgs) -> Result<()> {
    let record = ctx
        .desk
        .close_position(args.id, &args.reason, args.spot)
        .await?;

    let basis = match record.basis {
        CloseMethod::MarkToMarket => "mark-to-market",
        CloseMethod::Intrinsic => "intrinsic (ignores time value)",
    };

    println!("Closed {}", args.id);
    println!("  basis  {basis}");
    println!("  spot   {}", record.close_spot);
    println!("  value  {:.2}", record.close_value_usd);
    println!("  pnl    {:.2}", record.pnl_usd);
    println!("  equity {:.2}", ctx.desk.get_equity().equity);
    Ok(())
}
