//! Reset command.

use anyhow::{bail, Result};
use clap::Args;

use crate::context::DeskContext;

/// Arguments for the reset command.
#[derive(Args, Debug, Clone)]
pub struct ResetArgs {
    /// Confirm dropping every open and closed position
    #[arg(long)]
    pub yes: bool,
}

/// Clears the ledger.
///
/// # Errors
/// Returns an error unless `--yes` is given, or if the ledger store cannot
/// be locked or read.
pub fn run_reset(ctx: &DeskContext, args: ResetArgs) -> Result<()> {
    if !args.yes {
        bail!("reset drops every position; rerun with --yes to confirm");
    }

    let before = ctx.desk.list_open().len() + ctx.desk.list_closed().len();
    ctx.desk.reset_ledger()?;

    println!(
        "Ledger reset: {} positions dropped, equity {:.2}",
        before,
        ctx.desk.get_equity().equity
    );
    Ok(())
}
