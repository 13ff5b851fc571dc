//! Deribit public market-data gateway.
//!
//! Provides [`DeribitClient`], a rate-limited REST client that implements
//! [`gex_desk_core::QuoteSource`] for option legs and perpetual spot.

pub mod client;
pub mod error;
pub mod types;

pub use client::{DeribitClient, DeribitClientConfig, DERIBIT_PROD_URL, DERIBIT_TEST_URL};
pub use error::{DeribitError, Result};
pub use types::{Instrument, Ticker};
