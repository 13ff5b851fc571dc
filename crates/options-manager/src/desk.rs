//! Paper desk facade: the single mutation path for user and automatic actions.
//!
//! State lives behind one `parking_lot::RwLock`. Quote fetches happen with no
//! lock held; every ledger mutation happens under the write lock, so a manual
//! close racing an automatic one resolves to first-wins and the loser gets
//! `AlreadyClosed`.
//!
//! With a store attached, each mutation holds the store's writer lock while
//! it reloads the ledger, applies the change and saves. Other processes
//! (a one-shot `open` next to a running desk) can therefore write to the same
//! file; their changes are adopted before the next mutation or poll tick.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use gex_desk_core::{
    perpetual_instrument_name, CloseBasis, CloseRecord, DeskConfig, DeskError, EntryQuotes,
    EquityReport, ExitPolicyConfig, Position, PositionId, PositionTerms, PricingMode, QuoteSource,
    Result, ValuationSnapshot,
};

use crate::book::{ValuationBook, ValuationStatus};
use crate::exit_policy::{self, ExitTrigger, ExitVerdict};
use crate::ledger::Ledger;
use crate::poller::{self, MtmPoller, PollReport, PollTarget};
use crate::session::DeskSession;
use crate::store::{JsonLedgerStore, StoredLedger, STORE_VERSION};

// =============================================================================
// Views
// =============================================================================

/// One position with its breakevens and latest valuation.
#[derive(Debug, Clone, Serialize)]
pub struct PositionView {
    pub position: Position,
    pub breakeven_low: Decimal,
    pub breakeven_high: Decimal,
    pub valuation: Option<ValuationSnapshot>,
    pub status: ValuationStatus,
}

/// A position closed by the exit policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoClose {
    pub id: PositionId,
    pub trigger: ExitTrigger,
    pub record: CloseRecord,
}

// =============================================================================
// Internal State
// =============================================================================

#[derive(Debug)]
struct DeskState {
    ledger: Ledger,
    book: ValuationBook,
    session: DeskSession,
    exit_policy: ExitPolicyConfig,
    starting_cash: Decimal,
    /// Starting cash from configuration; applied again on reset.
    configured_cash: Decimal,
    pricing_mode: PricingMode,
    /// Revision of the stored ledger this state was loaded from or saved as.
    revision: u64,
}

impl DeskState {
    fn from_config(config: &DeskConfig) -> Self {
        Self {
            ledger: Ledger::new(config.ledger.prevent_duplicates),
            book: ValuationBook::new(),
            session: DeskSession::default(),
            exit_policy: config.exit_policy.clone(),
            starting_cash: config.account.starting_cash,
            configured_cash: config.account.starting_cash,
            pricing_mode: config.account.pricing_mode,
            revision: 0,
        }
    }

    /// Replaces ledger contents with a stored ledger written at another
    /// revision. Returns false if `stored` is the revision already held.
    fn adopt(&mut self, stored: StoredLedger) -> bool {
        if stored.revision == self.revision {
            return false;
        }

        let prevent_duplicates = self.ledger.prevent_duplicates();
        self.ledger = Ledger::from_positions(stored.positions, prevent_duplicates);
        self.exit_policy = stored.exit_policy;
        self.starting_cash = stored.starting_cash;
        self.pricing_mode = stored.pricing_mode;
        self.revision = stored.revision;

        let ledger = &self.ledger;
        self.book
            .retain(|id| ledger.get(id).is_some_and(Position::is_open));
        if let Some(active) = self.session.active_position {
            if !ledger.get(&active).is_some_and(Position::is_open) {
                self.session.active_position = None;
            }
        }
        true
    }

    fn to_stored(&self) -> StoredLedger {
        StoredLedger {
            version: STORE_VERSION,
            revision: self.revision,
            saved_at: Utc::now(),
            starting_cash: self.starting_cash,
            pricing_mode: self.pricing_mode,
            exit_policy: self.exit_policy.clone(),
            positions: self.ledger.positions().to_vec(),
        }
    }

    fn open_position(&self, id: &PositionId) -> Result<&Position> {
        let position = self
            .ledger
            .get(id)
            .ok_or_else(|| DeskError::position_not_found(*id))?;
        if !position.is_open() {
            return Err(DeskError::already_closed(*id));
        }
        Ok(position)
    }
}

/// Owned counterpart of [`CloseBasis`], built before taking the write lock.
enum ClosePlan {
    Valuation(ValuationSnapshot),
    ManualSpot(Decimal),
}

impl ClosePlan {
    fn basis(&self) -> CloseBasis<'_> {
        match self {
            Self::Valuation(snapshot) => CloseBasis::Valuation(snapshot),
            Self::ManualSpot(spot) => CloseBasis::ManualSpot(*spot),
        }
    }
}

/// Open positions the exit policy would close at `now`, oldest first.
fn triggered_exits(state: &DeskState, now: DateTime<Utc>) -> Vec<(PositionId, ExitTrigger)> {
    let policy = &state.exit_policy;
    if !exit_policy::is_active(policy) {
        return Vec::new();
    }

    state
        .ledger
        .open_positions()
        .filter_map(|position| {
            let snapshot = state.book.get(&position.id);
            match exit_policy::evaluate(policy, position, snapshot, now) {
                ExitVerdict::Close(trigger) => Some((position.id, trigger)),
                ExitVerdict::StaleSnapshot { age } => {
                    debug!(
                        position_id = %position.id,
                        age_ms = age.num_milliseconds(),
                        "Exit check skipped, valuation stale"
                    );
                    None
                }
                _ => None,
            }
        })
        .collect()
}

// =============================================================================
// PaperDesk
// =============================================================================

/// Paper straddle desk over a quote source.
pub struct PaperDesk<Q> {
    source: Q,
    state: RwLock<DeskState>,
    poller: Mutex<MtmPoller>,
    store: Option<JsonLedgerStore>,
    /// Serializes snapshot-and-write so saves land in commit order.
    persist_lock: Mutex<Option<String>>,
}

impl<Q> std::fmt::Debug for PaperDesk<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaperDesk")
            .field("store", &self.store.as_ref().map(JsonLedgerStore::path))
            .finish_non_exhaustive()
    }
}

impl<Q: QuoteSource> PaperDesk<Q> {
    /// Creates an in-memory desk with an empty ledger.
    pub fn new(source: Q, config: &DeskConfig) -> Self {
        Self {
            source,
            state: RwLock::new(DeskState::from_config(config)),
            poller: Mutex::new(MtmPoller::new(config.poller.clone())),
            store: None,
            persist_lock: Mutex::new(None),
        }
    }

    /// Creates a desk backed by a JSON store, restoring any saved ledger.
    ///
    /// Saved positions, exit policy, starting cash and pricing mode take
    /// precedence over `config`.
    ///
    /// # Errors
    /// `Persistence` if the stored ledger exists but cannot be loaded.
    pub fn with_store(source: Q, config: &DeskConfig, store: JsonLedgerStore) -> Result<Self> {
        let mut state = DeskState::from_config(config);

        if let Some(stored) = store.load()? {
            info!(
                path = %store.path().display(),
                positions = stored.positions.len(),
                saved_at = %stored.saved_at,
                "Restored paper ledger"
            );
            state.ledger =
                Ledger::from_positions(stored.positions, config.ledger.prevent_duplicates);
            state.exit_policy = stored.exit_policy;
            state.starting_cash = stored.starting_cash;
            state.pricing_mode = stored.pricing_mode;
            state.revision = stored.revision;
        }

        Ok(Self {
            source,
            state: RwLock::new(state),
            poller: Mutex::new(MtmPoller::new(config.poller.clone())),
            store: Some(store),
            persist_lock: Mutex::new(None),
        })
    }

    pub fn source(&self) -> &Q {
        &self.source
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Open positions, most recent first.
    pub fn list_open(&self) -> Vec<Position> {
        self.state.read().ledger.list_open()
    }

    /// Closed positions, most recent first.
    pub fn list_closed(&self) -> Vec<Position> {
        self.state.read().ledger.list_closed()
    }

    pub fn get_position(&self, id: &PositionId) -> Option<Position> {
        self.state.read().ledger.get(id).cloned()
    }

    /// Latest snapshot for a position, however old.
    pub fn get_valuation(&self, id: &PositionId) -> Option<ValuationSnapshot> {
        self.state.read().book.get(id).cloned()
    }

    pub fn valuation_status(&self, id: &PositionId, now: DateTime<Utc>) -> ValuationStatus {
        let state = self.state.read();
        state.book.status(id, now, state.exit_policy.max_staleness())
    }

    /// Equity from realized P&L, with open exposure from the latest snapshots.
    pub fn get_equity(&self) -> EquityReport {
        let state = self.state.read();
        EquityReport::compute(state.starting_cash, state.ledger.positions(), |id| {
            state.book.get(id)
        })
    }

    pub fn position_view(&self, id: &PositionId, now: DateTime<Utc>) -> Option<PositionView> {
        let state = self.state.read();
        let position = state.ledger.get(id)?;
        Some(PositionView {
            breakeven_low: position.breakeven_low(),
            breakeven_high: position.breakeven_high(),
            valuation: state.book.get(id).cloned(),
            status: state.book.status(id, now, state.exit_policy.max_staleness()),
            position: position.clone(),
        })
    }

    pub fn exit_policy(&self) -> ExitPolicyConfig {
        self.state.read().exit_policy.clone()
    }

    pub fn starting_cash(&self) -> Decimal {
        self.state.read().starting_cash
    }

    /// Pricing mode new entries default to.
    pub fn pricing_mode(&self) -> PricingMode {
        self.state.read().pricing_mode
    }

    pub fn session(&self) -> DeskSession {
        self.state.read().session
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        self.poller.lock().config().interval()
    }

    /// Error from the most recent failed save, cleared by the next good one.
    pub fn last_persist_error(&self) -> Option<String> {
        self.persist_lock.lock().clone()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Opens a straddle at the supplied entry quotes.
    ///
    /// # Errors
    /// `InvalidEntry` or `DuplicatePosition`; the ledger is untouched.
    /// `Persistence` if the store cannot be locked or reloaded.
    pub fn open_position(&self, terms: PositionTerms, entry: EntryQuotes) -> Result<Position> {
        self.commit(|state| Ok(state.ledger.open(terms, entry, Utc::now())?.clone()))
    }

    /// Fetches entry quotes and spot from the quote source, then opens.
    ///
    /// # Errors
    /// `InvalidEntry` for missing legs or no usable spot, `QuoteUnavailable`
    /// if the fetch fails, `DuplicatePosition` as for [`Self::open_position`].
    pub async fn open_position_live(&self, terms: PositionTerms) -> Result<Position> {
        let (Some(call), Some(put)) = (
            terms.call_instrument.clone().filter(|n| !n.trim().is_empty()),
            terms.put_instrument.clone().filter(|n| !n.trim().is_empty()),
        ) else {
            return Err(DeskError::invalid_entry("missing leg instrument"));
        };

        let perpetual = perpetual_instrument_name(&terms.currency);
        let timeout = self.poller.lock().config().fetch_timeout();
        let (call_quote, put_quote, spot) =
            poller::fetch_quotes(&self.source, call.trim(), put.trim(), &perpetual, timeout)
                .await?;

        let entry = EntryQuotes {
            call: call_quote,
            put: put_quote,
            spot: spot.resolve(Decimal::ZERO),
        };
        self.open_position(terms, entry)
    }

    /// Closes a position.
    ///
    /// With `manual_spot` the close uses the straddle's intrinsic payoff at
    /// that spot. Otherwise it uses the latest snapshot if fresh, or fetches
    /// a live valuation.
    ///
    /// # Errors
    /// `PositionNotFound`, `AlreadyClosed`, `InvalidClose`, or
    /// `QuoteUnavailable` when no fresh valuation can be obtained. The
    /// ledger is untouched on error.
    pub async fn close_position(
        &self,
        id: PositionId,
        reason: &str,
        manual_spot: Option<Decimal>,
    ) -> Result<CloseRecord> {
        let (position, fresh) = {
            let state = self.state.read();
            let position = state.open_position(&id)?.clone();
            let fresh = state
                .book
                .get(&id)
                .filter(|s| s.is_fresh(Utc::now(), state.exit_policy.max_staleness()))
                .cloned();
            (position, fresh)
        };

        let plan = match (manual_spot, fresh) {
            (Some(spot), _) => ClosePlan::ManualSpot(spot),
            (None, Some(snapshot)) => ClosePlan::Valuation(snapshot),
            (None, None) => {
                debug!(position_id = %id, "No fresh valuation, fetching live quotes for close");
                let timeout = self.poller.lock().config().fetch_timeout();
                let target = PollTarget {
                    fallback_spot: position.entry_spot,
                    position,
                };
                ClosePlan::Valuation(
                    poller::fetch_snapshot(&self.source, &target, timeout, Utc::now()).await?,
                )
            }
        };

        let reason = if reason.trim().is_empty() {
            "manual"
        } else {
            reason.trim()
        };

        self.commit(|state| {
            let record = state.ledger.close(id, reason, plan.basis(), Utc::now())?;
            state.book.remove(&id);
            state.session.forget(&id);
            Ok(record)
        })
    }

    /// Replaces the TP/SL thresholds and the auto-exit switch.
    ///
    /// The staleness window is kept.
    ///
    /// # Errors
    /// `Persistence` if the store cannot be locked or reloaded.
    pub fn configure_exit_policy(
        &self,
        take_profit_usd: Decimal,
        stop_loss_usd: Decimal,
        auto_enabled: bool,
    ) -> Result<ExitPolicyConfig> {
        let policy = self.commit(|state| {
            state.exit_policy.take_profit_usd = take_profit_usd.max(Decimal::ZERO);
            state.exit_policy.stop_loss_usd = stop_loss_usd.abs();
            state.exit_policy.auto_enabled = auto_enabled;
            Ok(state.exit_policy.clone())
        })?;

        info!(
            take_profit = %policy.take_profit_usd,
            stop_loss = %policy.stop_loss_usd,
            auto = policy.auto_enabled,
            "Exit policy updated"
        );
        Ok(policy)
    }

    /// Applies a reloaded configuration file: exit policy, poller and
    /// duplicate prevention. Positions and the session are untouched.
    ///
    /// # Errors
    /// `Persistence` if the store cannot be locked or reloaded.
    pub fn apply_config(&self, config: &DeskConfig) -> Result<()> {
        self.commit(|state| {
            state.exit_policy = config.exit_policy.clone();
            state.configured_cash = config.account.starting_cash;
            state
                .ledger
                .set_prevent_duplicates(config.ledger.prevent_duplicates);
            Ok(())
        })?;
        self.poller.lock().set_config(config.poller.clone());
        info!("Applied reloaded configuration");
        Ok(())
    }

    /// Drops every position and snapshot and restores the configured
    /// starting cash.
    ///
    /// # Errors
    /// `Persistence` if the store cannot be locked or reloaded.
    pub fn reset_ledger(&self) -> Result<()> {
        let dropped = self.commit(|state| {
            let dropped = state.ledger.len();
            state.ledger.reset();
            state.book.clear();
            state.session.active_position = None;
            state.starting_cash = state.configured_cash;
            Ok(dropped)
        })?;
        warn!(dropped, "Paper ledger reset");
        Ok(())
    }

    /// Sets or clears the position refreshed in focus mode.
    ///
    /// # Errors
    /// `PositionNotFound` or `AlreadyClosed` for an id that is not open.
    pub fn set_active(&self, id: Option<PositionId>) -> Result<()> {
        let mut state = self.state.write();
        if let Some(id) = &id {
            state.open_position(id)?;
        }
        state.session.active_position = id;
        Ok(())
    }

    /// Limits polling to the active position, independent of the poller
    /// config. The exit policy and everything else in the ledger is kept.
    pub fn set_focus_mode(&self, enabled: bool) {
        self.state.write().session.focus_only = enabled;
    }

    pub fn set_live_refresh(&self, enabled: bool) {
        self.state.write().session.live_refresh = enabled;
    }

    // =========================================================================
    // MTM and exits
    // =========================================================================

    /// Runs one mark-to-market tick, stamping snapshots with `now`.
    ///
    /// Positions closed while their quotes were in flight are not updated.
    pub async fn poll_once(&self, now: DateTime<Utc>) -> PollReport {
        self.refresh_from_store();

        let (targets, open_count) = {
            let state = self.state.read();
            if !state.session.live_refresh {
                return PollReport::paused();
            }

            let open: Vec<PositionId> = state.ledger.open_positions().map(|p| p.id).collect();
            let selected = self
                .poller
                .lock()
                .select(&open, state.session.active_position, state.session.focus_only);

            let targets: Vec<PollTarget> = selected
                .iter()
                .filter_map(|id| state.ledger.get(id))
                .map(|p| PollTarget {
                    fallback_spot: state.book.get(&p.id).map_or(p.entry_spot, |s| s.spot),
                    position: p.clone(),
                })
                .collect();
            (targets, open.len())
        };

        let mut report = PollReport {
            skipped: open_count - targets.len(),
            ..PollReport::default()
        };
        if targets.is_empty() {
            return report;
        }

        let timeout = self.poller.lock().config().fetch_timeout();
        let results = poller::fetch_all(&self.source, &targets, timeout, now).await;

        {
            let mut guard = self.state.write();
            let state = &mut *guard;
            for (id, result) in results {
                if !state.ledger.get(&id).is_some_and(Position::is_open) {
                    continue;
                }
                match result {
                    Ok(snapshot) => {
                        state.book.publish(snapshot);
                        report.refreshed.push(id);
                    }
                    Err(e) => {
                        state.book.record_failure(id, &e);
                        report.failed.push((id, e));
                    }
                }
            }
        }

        debug!(
            refreshed = report.refreshed.len(),
            failed = report.failed.len(),
            skipped = report.skipped,
            "MTM tick complete"
        );
        report
    }

    /// Runs one exit-policy pass over every open position.
    ///
    /// Each eligible position is closed independently at its snapshot; a
    /// position that was closed meanwhile is skipped.
    pub fn evaluate_exits(&self, now: DateTime<Utc>) -> Vec<AutoClose> {
        if triggered_exits(&self.state.read(), now).is_empty() {
            return Vec::new();
        }

        let result = self.commit(|state| {
            let mut closed = Vec::new();
            for (id, trigger) in triggered_exits(state, now) {
                let Some(snapshot) = state.book.get(&id).cloned() else {
                    continue;
                };
                let reason = trigger.reason();
                match state
                    .ledger
                    .close(id, &reason, CloseBasis::Valuation(&snapshot), now)
                {
                    Ok(record) => {
                        info!(
                            position_id = %id,
                            reason = %reason,
                            pnl = %record.pnl_usd,
                            "Exit policy closed position"
                        );
                        state.book.remove(&id);
                        state.session.forget(&id);
                        closed.push(AutoClose {
                            id,
                            trigger,
                            record,
                        });
                    }
                    Err(DeskError::AlreadyClosed { .. }) => {
                        debug!(position_id = %id, "Exit skipped, already closed");
                    }
                    Err(e) => {
                        error!(position_id = %id, error = %e, "Exit close failed");
                    }
                }
            }
            Ok(closed)
        });

        result.unwrap_or_else(|e| {
            error!(error = %e, "Exit pass could not commit");
            Vec::new()
        })
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Applies `mutate` to the latest committed state and saves the result.
    ///
    /// With a store, the writer lock is held from reload to save. A failed
    /// `mutate` leaves both memory and disk untouched. A failed save is
    /// logged and kept for [`Self::last_persist_error`]; the in-memory change
    /// stands and is written by the next successful save.
    fn commit<T>(&self, mutate: impl FnOnce(&mut DeskState) -> Result<T>) -> Result<T> {
        let mut last_error = self.persist_lock.lock();
        let Some(store) = &self.store else {
            let mut state = self.state.write();
            return mutate(&mut *state);
        };

        let _lock = store.lock()?;
        let latest = store.load()?;

        let (out, stored) = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            if let Some(latest) = latest {
                if state.adopt(latest) {
                    info!(revision = state.revision, "Adopted ledger changes from another writer");
                }
            }
            let out = mutate(&mut *state)?;
            let mut stored = state.to_stored();
            stored.revision += 1;
            (out, stored)
        };

        match store.save(&stored) {
            Ok(()) => {
                self.state.write().revision = stored.revision;
                *last_error = None;
            }
            Err(e) => {
                error!(path = %store.path().display(), error = %e, "Failed to persist ledger");
                *last_error = Some(e.to_string());
            }
        }
        Ok(out)
    }

    /// Picks up changes another process saved since the last commit.
    fn refresh_from_store(&self) {
        let Some(store) = &self.store else {
            return;
        };

        let _guard = self.persist_lock.lock();
        match store.load() {
            Ok(Some(latest)) => {
                let mut state = self.state.write();
                if state.adopt(latest) {
                    info!(revision = state.revision, "Adopted ledger changes from another writer");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Could not reload ledger, keeping in-memory state"),
        }
    }
}
