//! Main service loop: MTM tick followed by an exit-policy pass.

use anyhow::Result;
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{info, warn};

use gex_desk_core::{DeskConfig, QuoteSource};

use crate::desk::{AutoClose, PaperDesk};
use crate::poller::PollReport;

/// What one service tick did.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub poll: PollReport,
    pub exits: Vec<AutoClose>,
}

fn ticker(period: std::time::Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Waits for the next config update; never resolves once the sender is gone.
async fn next_update(updates: &mut Option<watch::Receiver<DeskConfig>>) -> DeskConfig {
    if let Some(rx) = updates.as_mut() {
        if rx.changed().await.is_ok() {
            return rx.borrow_and_update().clone();
        }
    }
    *updates = None;
    std::future::pending().await
}

impl<Q: QuoteSource> PaperDesk<Q> {
    /// One tick: refresh valuations, then apply the exit policy.
    pub async fn tick(&self) -> TickReport {
        let poll = self.poll_once(Utc::now()).await;
        let exits = self.evaluate_exits(Utc::now());
        TickReport { poll, exits }
    }

    /// Runs the desk until `shutdown` becomes `true` or its sender drops.
    ///
    /// # Errors
    /// Currently never fails; the signature leaves room for fatal errors.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        self.run_with_updates(shutdown, None).await
    }

    /// Like [`Self::run`], also applying configuration reloads as they
    /// arrive.
    ///
    /// # Errors
    /// Currently never fails; the signature leaves room for fatal errors.
    pub async fn run_with_updates(
        &self,
        mut shutdown: watch::Receiver<bool>,
        mut updates: Option<watch::Receiver<DeskConfig>>,
    ) -> Result<()> {
        let policy = self.exit_policy();
        let mut period = self.poll_interval();
        info!(
            interval_ms = period.as_millis() as u64,
            take_profit = %policy.take_profit_usd,
            stop_loss = %policy.stop_loss_usd,
            auto = policy.auto_enabled,
            max_staleness_secs = policy.max_staleness_secs,
            open = self.list_open().len(),
            "Paper desk started"
        );

        let mut interval = ticker(period);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick().await;
                    for (id, e) in &report.poll.failed {
                        warn!(position_id = %id, error = %e, "Position not revalued this tick");
                    }
                    if !report.exits.is_empty() {
                        let equity = self.get_equity();
                        info!(
                            closed = report.exits.len(),
                            equity = %equity.equity,
                            realized = %equity.realized_pnl,
                            "Exit pass closed positions"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                config = next_update(&mut updates) => {
                    if let Err(e) = self.apply_config(&config) {
                        warn!(error = %e, "Reloaded configuration not applied");
                    }
                    let new_period = self.poll_interval();
                    if new_period != period {
                        info!(interval_ms = new_period.as_millis() as u64, "Poll interval changed");
                        period = new_period;
                        interval = ticker(period);
                    }
                }
            }
        }

        info!("Paper desk stopped");
        Ok(())
    }
}
