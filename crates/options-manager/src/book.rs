//! Latest valuation snapshot per position, plus the last fetch failure.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use gex_desk_core::{DeskError, PositionId, ValuationSnapshot};

/// Freshness of a position's valuation as seen by readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ValuationStatus {
    /// Snapshot within the staleness window.
    Fresh { age_ms: i64 },
    /// Snapshot exists but is older than the staleness window.
    Stale {
        age_ms: i64,
        last_error: Option<String>,
    },
    /// No snapshot has been published yet.
    Unknown { last_error: Option<String> },
}

impl ValuationStatus {
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh { .. })
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh { .. } => "fresh",
            Self::Stale { .. } => "stale",
            Self::Unknown { .. } => "unknown",
        }
    }
}

/// Ephemeral store of valuation snapshots keyed by position id.
///
/// A failed tick never replaces the previous snapshot; it only records the
/// error, so the old snapshot ages into staleness.
#[derive(Debug, Clone, Default)]
pub struct ValuationBook {
    snapshots: HashMap<PositionId, ValuationSnapshot>,
    errors: HashMap<PositionId, String>,
}

impl ValuationBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the snapshot for its position and clears any recorded error.
    pub fn publish(&mut self, snapshot: ValuationSnapshot) {
        self.errors.remove(&snapshot.position_id);
        self.snapshots.insert(snapshot.position_id, snapshot);
    }

    pub fn record_failure(&mut self, id: PositionId, error: &DeskError) {
        self.errors.insert(id, error.to_string());
    }

    #[must_use]
    pub fn get(&self, id: &PositionId) -> Option<&ValuationSnapshot> {
        self.snapshots.get(id)
    }

    #[must_use]
    pub fn last_error(&self, id: &PositionId) -> Option<&str> {
        self.errors.get(id).map(String::as_str)
    }

    #[must_use]
    pub fn status(
        &self,
        id: &PositionId,
        now: DateTime<Utc>,
        max_staleness: Duration,
    ) -> ValuationStatus {
        let last_error = self.errors.get(id).cloned();
        match self.snapshots.get(id) {
            Some(snapshot) => {
                let age_ms = snapshot.age(now).num_milliseconds();
                if snapshot.is_fresh(now, max_staleness) {
                    ValuationStatus::Fresh { age_ms }
                } else {
                    ValuationStatus::Stale { age_ms, last_error }
                }
            }
            None => ValuationStatus::Unknown { last_error },
        }
    }

    /// Forgets everything about a position (used once it closes).
    pub fn remove(&mut self, id: &PositionId) {
        self.snapshots.remove(id);
        self.errors.remove(id);
    }

    /// Keeps only the positions for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&PositionId) -> bool) {
        self.snapshots.retain(|id, _| keep(id));
        self.errors.retain(|id, _| keep(id));
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.errors.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
