#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use gex_desk_core::{
    DeskConfig, DeskError, EntryQuotes, LegQuote, PositionTerms, QuoteSource, Result, SpotQuote,
};

pub const CALL: &str = "BTC-27DEC24-60000-C";
pub const PUT: &str = "BTC-27DEC24-60000-P";
pub const PERP: &str = "BTC-PERPETUAL";

/// Scripted quote source: fixed quotes, per-instrument failures and delays.
#[derive(Default)]
pub struct FakeQuotes {
    quotes: Mutex<HashMap<String, LegQuote>>,
    spots: Mutex<HashMap<String, SpotQuote>>,
    failing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: AtomicUsize,
}

impl FakeQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_quote(&self, instrument: &str, quote: LegQuote) {
        self.quotes.lock().insert(instrument.to_string(), quote);
    }

    pub fn set_spot(&self, perpetual: &str, index_price: Decimal) {
        self.spots.lock().insert(
            perpetual.to_string(),
            SpotQuote {
                index_price: Some(index_price),
                last_price: None,
            },
        );
    }

    pub fn set_raw_spot(&self, perpetual: &str, spot: SpotQuote) {
        self.spots.lock().insert(perpetual.to_string(), spot);
    }

    pub fn fail(&self, instrument: &str) {
        self.failing.lock().insert(instrument.to_string());
    }

    pub fn recover(&self, instrument: &str) {
        self.failing.lock().remove(instrument);
    }

    pub fn delay(&self, instrument: &str, delay: Duration) {
        self.delays.lock().insert(instrument.to_string(), delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn prepare(&self, instrument: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.lock().get(instrument).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(instrument) {
            return Err(DeskError::quote_unavailable(instrument, "scripted failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl QuoteSource for FakeQuotes {
    async fn get_quote(&self, instrument: &str) -> Result<LegQuote> {
        self.prepare(instrument).await?;
        self.quotes
            .lock()
            .get(instrument)
            .cloned()
            .ok_or_else(|| DeskError::quote_unavailable(instrument, "no quote scripted"))
    }

    async fn get_spot(&self, perpetual: &str) -> Result<SpotQuote> {
        self.prepare(perpetual).await?;
        self.spots
            .lock()
            .get(perpetual)
            .cloned()
            .ok_or_else(|| DeskError::quote_unavailable(perpetual, "no spot scripted"))
    }
}

pub fn config() -> DeskConfig {
    let mut config = DeskConfig::default();
    config.poller.fetch_timeout_ms = 200;
    config
}

pub fn terms() -> PositionTerms {
    PositionTerms::new("BTC", "27DEC24", dec!(60000), CALL, PUT)
}

/// Terms for a distinct strike, with its own leg names.
pub fn terms_at(strike: u32) -> PositionTerms {
    PositionTerms::new(
        "BTC",
        "27DEC24",
        Decimal::from(strike),
        format!("BTC-27DEC24-{strike}-C"),
        format!("BTC-27DEC24-{strike}-P"),
    )
}

pub fn scenario_a_call() -> LegQuote {
    LegQuote::new(dec!(0.01), dec!(0.012), dec!(0.011))
}

pub fn scenario_a_put() -> LegQuote {
    LegQuote::new(dec!(0.008), dec!(0.009), dec!(0.0085))
}

/// Entry at 660 + 510 = 1170.
pub fn scenario_a_entry() -> EntryQuotes {
    EntryQuotes {
        call: scenario_a_call(),
        put: scenario_a_put(),
        spot: dec!(60000),
    }
}

/// Source quoting the Scenario B marks (700 + 550 at spot 50000).
pub fn scenario_b_source() -> FakeQuotes {
    let source = FakeQuotes::new();
    source.set_quote(CALL, LegQuote::new(dec!(0.013), dec!(0.015), dec!(0.014)));
    source.set_quote(PUT, LegQuote::new(dec!(0.010), dec!(0.012), dec!(0.011)));
    source.set_spot(PERP, dec!(50000));
    source
}

/// Quotes every leg of `terms_at(strike)` at Scenario B marks.
pub fn quote_strike(source: &FakeQuotes, strike: u32) {
    source.set_quote(
        &format!("BTC-27DEC24-{strike}-C"),
        LegQuote::new(dec!(0.013), dec!(0.015), dec!(0.014)),
    );
    source.set_quote(
        &format!("BTC-27DEC24-{strike}-P"),
        LegQuote::new(dec!(0.010), dec!(0.012), dec!(0.011)),
    );
}
