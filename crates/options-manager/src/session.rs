//! Per-operator view state.

use serde::{Deserialize, Serialize};

use gex_desk_core::PositionId;

/// Which position the operator is looking at, whether polling is limited to
/// it, and whether live refresh is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskSession {
    /// Position refreshed in focus mode.
    pub active_position: Option<PositionId>,
    /// Refresh only `active_position`, whatever the poller config says.
    pub focus_only: bool,
    /// When off, poll ticks fetch nothing.
    pub live_refresh: bool,
}

impl Default for DeskSession {
    fn default() -> Self {
        Self {
            active_position: None,
            focus_only: false,
            live_refresh: true,
        }
    }
}

impl DeskSession {
    /// Clears the active position if it is `id`.
    pub fn forget(&mut self, id: &PositionId) {
        if self.active_position.as_ref() == Some(id) {
            self.active_position = None;
        }
    }
}
