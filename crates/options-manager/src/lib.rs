//! Paper straddle management.
//!
//! Runs as a long-lived service that:
//! - Keeps the paper ledger of simulated straddles
//! - Revalues open positions against live quotes on a fixed cadence
//! - Closes positions on take-profit / stop-loss, only from fresh valuations
//! - Persists the ledger to a JSON file after every mutation, under a lock
//!   file shared with other processes using the same ledger
//!
//! The desk is generic over `QuoteSource`, so everything here runs against a
//! scripted fake in tests.

pub mod book;
pub mod desk;
pub mod exit_policy;
pub mod ledger;
pub mod poller;
pub mod service;
pub mod session;
pub mod store;

pub use book::{ValuationBook, ValuationStatus};
pub use desk::{AutoClose, PaperDesk, PositionView};
pub use exit_policy::{ExitTrigger, ExitVerdict};
pub use ledger::Ledger;
pub use poller::{MtmPoller, PollReport};
pub use service::TickReport;
pub use session::DeskSession;
pub use store::{JsonLedgerStore, StoreLock, StoredLedger};
