//! Long-running desk: MTM poller plus exit policy until Ctrl+C.

use anyhow::Result;
use clap::Args;
use tokio::sync::watch;

use gex_desk_core::ConfigWatcher;

use super::status::print_report;
use crate::context::DeskContext;

/// Arguments for the run command.
#[derive(Args, Debug, Clone)]
pub struct RunDeskArgs {
    /// Do not reload the config file when it changes
    #[arg(long)]
    pub no_watch: bool,

    /// Refresh only this position
    #[arg(long)]
    pub focus: Option<gex_desk_core::PositionId>,
}

/// Runs the desk loop.
///
/// # Errors
/// Returns an error if the focus position is not open.
pub async fn run_desk(ctx: DeskContext, args: RunDeskArgs) -> Result<()> {
    if let Some(id) = args.focus {
        ctx.desk.set_active(Some(id))?;
        ctx.desk.set_focus_mode(true);
        tracing::info!(position_id = %id, "Focus mode on");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let updates = if args.no_watch {
        None
    } else {
        let (watcher, rx) = ConfigWatcher::new(ctx.config.clone());
        let watcher = watcher.with_profile(ctx.profile.clone());
        let path = ctx.config_path.clone();
        tokio::spawn(async move {
            if let Err(e) = watcher.watch(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "Config watch stopped");
            }
        });
        Some(rx)
    };

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        let _ = shutdown_tx.send(true);
    });

    ctx.desk.run_with_updates(shutdown_rx, updates).await?;

    print_report(&ctx, chrono::Utc::now());
    Ok(())
}
