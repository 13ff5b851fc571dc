//! Core types for the gex-desk paper straddle simulator.
//!
//! Everything here is free of I/O and scheduling:
//! - leg pricing (`MARK` / `MID`) and settlement conversion
//! - the straddle position lifecycle (open → closed)
//! - valuation snapshots and equity reporting
//! - the `QuoteSource` seam implemented by venue clients and test fakes
//! - layered configuration

pub mod config;
pub mod config_loader;
pub mod config_watcher;
pub mod equity;
pub mod error;
pub mod instruments;
pub mod position;
pub mod pricing;
pub mod quote;
pub mod traits;
pub mod valuation;

pub use config::{
    AccountConfig, DeribitConfig, DeskConfig, ExitPolicyConfig, LedgerConfig, PollerConfig,
};
pub use config_loader::ConfigLoader;
pub use config_watcher::ConfigWatcher;
pub use equity::EquityReport;
pub use error::{DeskError, Result};
pub use instruments::{option_instrument_name, perpetual_instrument_name, OptionRight};
pub use position::{
    CloseBasis, CloseMethod, CloseRecord, EntryQuotes, Position, PositionId, PositionStatus,
    PositionTerms, StraddleLegs,
};
pub use quote::{LegQuote, PricingMode, SpotQuote};
pub use traits::QuoteSource;
pub use valuation::ValuationSnapshot;
