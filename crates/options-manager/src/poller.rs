//! Mark-to-market poller.
//!
//! One tick selects a bounded set of open positions, fetches both legs and
//! spot for each concurrently, and yields either a complete snapshot or an
//! error per position. Publishing into the book is left to the caller.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use gex_desk_core::{
    perpetual_instrument_name, DeskError, LegQuote, PollerConfig, Position, PositionId,
    QuoteSource, Result, SpotQuote, ValuationSnapshot,
};

/// What one poll tick did.
#[derive(Debug, Clone, Default)]
pub struct PollReport {
    /// Positions whose snapshot was replaced.
    pub refreshed: Vec<PositionId>,
    /// Positions whose fetch failed this tick.
    pub failed: Vec<(PositionId, DeskError)>,
    /// Open positions left for a later tick by the fan-out cap or focus mode.
    pub skipped: usize,
    /// Live refresh was off; nothing was fetched.
    pub paused: bool,
}

impl PollReport {
    #[must_use]
    pub fn paused() -> Self {
        Self {
            paused: true,
            ..Self::default()
        }
    }
}

/// Position to refresh together with the spot to fall back on.
#[derive(Debug, Clone)]
pub struct PollTarget {
    pub position: Position,
    pub fallback_spot: Decimal,
}

/// Picks the positions to refresh each tick.
///
/// With more open positions than `max_positions_per_tick`, a cursor rotates
/// through them so every position is refreshed within
/// `ceil(open / cap)` ticks.
#[derive(Debug, Clone)]
pub struct MtmPoller {
    config: PollerConfig,
    cursor: usize,
}

impl MtmPoller {
    #[must_use]
    pub fn new(config: PollerConfig) -> Self {
        Self { config, cursor: 0 }
    }

    #[must_use]
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PollerConfig) {
        self.config = config;
    }

    /// Selects which of `open` (insertion order) to refresh this tick.
    ///
    /// In focus mode (configured, or requested by the session through
    /// `focus`) only `active` is returned, and only if it is open.
    pub fn select(
        &mut self,
        open: &[PositionId],
        active: Option<PositionId>,
        focus: bool,
    ) -> Vec<PositionId> {
        if focus || self.config.focus_active_only {
            return active
                .filter(|id| open.contains(id))
                .into_iter()
                .collect();
        }

        let cap = self.config.max_positions_per_tick.max(1);
        if open.len() <= cap {
            self.cursor = 0;
            return open.to_vec();
        }

        let start = self.cursor % open.len();
        let selected = open
            .iter()
            .cycle()
            .skip(start)
            .take(cap)
            .copied()
            .collect();
        self.cursor = (start + cap) % open.len();
        selected
    }
}

/// Fetches two legs and the perpetual's spot under one deadline.
///
/// The three requests run concurrently. A failed leg or the deadline fails
/// the whole fetch; a failed spot request yields an empty [`SpotQuote`], so
/// the caller's fallback spot applies.
pub async fn fetch_quotes<Q>(
    source: &Q,
    call: &str,
    put: &str,
    perpetual: &str,
    timeout: Duration,
) -> Result<(LegQuote, LegQuote, SpotQuote)>
where
    Q: QuoteSource + ?Sized,
{
    let fetch = async {
        let (call_quote, put_quote, spot) = tokio::join!(
            source.get_quote(call),
            source.get_quote(put),
            source.get_spot(perpetual),
        );
        let spot = spot.unwrap_or_else(|e| {
            debug!(perpetual, error = %e, "Spot unavailable, using fallback");
            SpotQuote::default()
        });
        Ok::<_, DeskError>((call_quote?, put_quote?, spot))
    };

    tokio::time::timeout(timeout, fetch).await.map_err(|_| {
        DeskError::quote_unavailable(
            format!("{call}/{put}"),
            format!("timed out after {}ms", timeout.as_millis()),
        )
    })?
}

/// Fetches both legs and spot for one position and builds its snapshot.
///
/// Either both legs come from this fetch or no snapshot is built.
pub async fn fetch_snapshot<Q>(
    source: &Q,
    target: &PollTarget,
    timeout: Duration,
    fetched_at: DateTime<Utc>,
) -> Result<ValuationSnapshot>
where
    Q: QuoteSource + ?Sized,
{
    let position = &target.position;
    let perpetual = perpetual_instrument_name(&position.currency);

    let (call, put, spot) = fetch_quotes(
        source,
        &position.legs.call,
        &position.legs.put,
        &perpetual,
        timeout,
    )
    .await?;

    let spot = spot.resolve(target.fallback_spot);
    Ok(ValuationSnapshot::compute(
        position, call, put, spot, fetched_at,
    ))
}

/// Runs one tick over `targets` concurrently.
///
/// Returns one result per target, in the same order.
pub async fn fetch_all<Q>(
    source: &Q,
    targets: &[PollTarget],
    timeout: Duration,
    fetched_at: DateTime<Utc>,
) -> Vec<(PositionId, Result<ValuationSnapshot>)>
where
    Q: QuoteSource + ?Sized,
{
    let futures = targets.iter().map(|target| async move {
        let id = target.position.id;
        let result = fetch_snapshot(source, target, timeout, fetched_at).await;
        match &result {
            Ok(snapshot) => debug!(
                position_id = %id,
                value = %snapshot.value_usd,
                pnl = %snapshot.pnl_usd,
                spot = %snapshot.spot,
                "Valuation refreshed"
            ),
            Err(e) => warn!(position_id = %id, error = %e, "Valuation fetch failed"),
        }
        (id, result)
    });

    join_all(futures).await
}
