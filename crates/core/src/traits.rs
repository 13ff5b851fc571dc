use crate::error::Result;
use crate::quote::{LegQuote, SpotQuote};
use async_trait::async_trait;
use std::sync::Arc;

/// Read-only source of live option quotes and underlying spot.
///
/// A returned record with missing fields is valid; an `Err` means the record
/// itself could not be obtained and is reported as `QuoteUnavailable`.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn get_quote(&self, instrument: &str) -> Result<LegQuote>;

    async fn get_spot(&self, perpetual: &str) -> Result<SpotQuote>;
}

#[async_trait]
impl<T: QuoteSource + ?Sized> QuoteSource for Arc<T> {
    async fn get_quote(&self, instrument: &str) -> Result<LegQuote> {
        (**self).get_quote(instrument).await
    }

    async fn get_spot(&self, perpetual: &str) -> Result<SpotQuote> {
        (**self).get_spot(perpetual).await
    }
}
