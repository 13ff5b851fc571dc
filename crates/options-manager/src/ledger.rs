//! Trade ledger: the authoritative, insertion-ordered list of straddles.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use gex_desk_core::{
    CloseBasis, CloseRecord, DeskError, EntryQuotes, Position, PositionId, PositionTerms, Result,
};

/// Insertion-ordered collection of positions.
///
/// Positions are only ever appended, closed in place, or dropped all at once
/// by [`Ledger::reset`].
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    positions: Vec<Position>,
    prevent_duplicates: bool,
}

impl Ledger {
    #[must_use]
    pub fn new(prevent_duplicates: bool) -> Self {
        Self {
            positions: Vec::new(),
            prevent_duplicates,
        }
    }

    /// Rebuilds a ledger from persisted positions, keeping their order.
    #[must_use]
    pub fn from_positions(positions: Vec<Position>, prevent_duplicates: bool) -> Self {
        Self {
            positions,
            prevent_duplicates,
        }
    }

    #[must_use]
    pub fn prevent_duplicates(&self) -> bool {
        self.prevent_duplicates
    }

    pub fn set_prevent_duplicates(&mut self, enabled: bool) {
        self.prevent_duplicates = enabled;
    }

    /// Opens a straddle and appends it.
    ///
    /// # Errors
    /// `InvalidEntry` from validation, or `DuplicatePosition` when an open
    /// straddle with the same currency/strike/expiry exists and duplicates
    /// are prevented. The ledger is untouched on error.
    pub fn open(
        &mut self,
        terms: PositionTerms,
        entry: EntryQuotes,
        now: DateTime<Utc>,
    ) -> Result<&Position> {
        let position = Position::open(terms, entry, now)?;

        if self.prevent_duplicates {
            let key = position.duplicate_key();
            if self
                .positions
                .iter()
                .any(|p| p.is_open() && p.duplicate_key() == key)
            {
                return Err(DeskError::duplicate_position(
                    &position.currency,
                    position.strike,
                    &position.expiry,
                ));
            }
        }

        info!(
            position_id = %position.id,
            currency = %position.currency,
            expiry = %position.expiry,
            strike = %position.strike,
            quantity = %position.quantity,
            total_cost = %position.total_cost_usd,
            "Opened paper straddle"
        );

        self.positions.push(position);
        let index = self.positions.len() - 1;
        Ok(&self.positions[index])
    }

    /// Closes a position in place.
    ///
    /// # Errors
    /// `PositionNotFound`, `AlreadyClosed` or `InvalidClose`; nothing changes
    /// on error.
    pub fn close(
        &mut self,
        id: PositionId,
        reason: &str,
        basis: CloseBasis<'_>,
        now: DateTime<Utc>,
    ) -> Result<CloseRecord> {
        let position = self
            .positions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| DeskError::position_not_found(id))?;

        let record = position.close(reason, basis, now)?.clone();

        info!(
            position_id = %id,
            reason = %record.reason,
            close_value = %record.close_value_usd,
            pnl = %record.pnl_usd,
            basis = ?record.basis,
            "Closed paper straddle"
        );

        Ok(record)
    }

    #[must_use]
    pub fn get(&self, id: &PositionId) -> Option<&Position> {
        self.positions.iter().find(|p| &p.id == id)
    }

    /// All positions in insertion order (oldest first).
    #[must_use]
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Open positions in insertion order (oldest first).
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| p.is_open())
    }

    /// Open positions, most recent first.
    #[must_use]
    pub fn list_open(&self) -> Vec<Position> {
        self.positions
            .iter()
            .rev()
            .filter(|p| p.is_open())
            .cloned()
            .collect()
    }

    /// Closed positions, most recent first.
    #[must_use]
    pub fn list_closed(&self) -> Vec<Position> {
        self.positions
            .iter()
            .rev()
            .filter(|p| !p.is_open())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[must_use]
    pub fn realized_pnl(&self) -> Decimal {
        gex_desk_core::equity::realized_pnl(&self.positions)
    }

    /// Drops every position.
    pub fn reset(&mut self) {
        debug!(dropped = self.positions.len(), "Ledger reset");
        self.positions.clear();
    }
}
