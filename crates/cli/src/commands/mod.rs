//! CLI commands for the paper straddle desk.

pub mod close_position;
pub mod exit_policy;
pub mod open_position;
pub mod reset;
pub mod run_desk;
pub mod status;

pub use close_position::{run_close_position, ClosePositionArgs};
pub use exit_policy::{run_exit_policy, ExitPolicyArgs};
pub use open_position::{run_open_position, OpenPositionArgs};
pub use reset::{run_reset, ResetArgs};
pub use run_desk::{run_desk, RunDeskArgs};
pub use status::{run_status, StatusArgs};
