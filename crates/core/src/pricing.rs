//! Premium pricing for option legs.
//!
//! Venue option prices are quoted in underlying units; settlement values are
//! obtained by multiplying with the current spot. A premium of zero is a valid
//! result (no two-sided market and no mark) and is distinct from a missing
//! quote, which callers surface as `QuoteUnavailable`.

use rust_decimal::Decimal;

use crate::quote::{LegQuote, PricingMode};

/// Keeps only strictly positive prices.
fn positive(price: Option<Decimal>) -> Option<Decimal> {
    price.filter(|p| *p > Decimal::ZERO)
}

/// Bid/ask midpoint.
///
/// Both sides must be positive for a true midpoint; otherwise whichever side
/// is present is used, else zero.
#[must_use]
pub fn mid(bid: Option<Decimal>, ask: Option<Decimal>) -> Decimal {
    match (positive(bid), positive(ask)) {
        (Some(b), Some(a)) => (b + a) / Decimal::TWO,
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => Decimal::ZERO,
    }
}

/// Premium of one leg in underlying units.
#[must_use]
pub fn price(quote: &LegQuote, mode: PricingMode) -> Decimal {
    let mark = positive(quote.mark).unwrap_or(Decimal::ZERO);
    let mid = mid(quote.bid, quote.ask);

    match mode {
        PricingMode::Mark if !mark.is_zero() => mark,
        PricingMode::Mark => mid,
        PricingMode::Mid if !mid.is_zero() => mid,
        PricingMode::Mid => mark,
    }
}

/// Premium of one leg converted to settlement currency.
#[must_use]
pub fn premium_usd(quote: &LegQuote, mode: PricingMode, spot: Decimal) -> Decimal {
    price(quote, mode) * spot
}

/// Settlement value of `quantity` contracts of one leg.
#[must_use]
pub fn leg_value_usd(
    quote: &LegQuote,
    mode: PricingMode,
    spot: Decimal,
    quantity: Decimal,
) -> Decimal {
    premium_usd(quote, mode, spot) * quantity
}

/// Straddle payoff at expiry-style settlement, per contract.
#[must_use]
pub fn straddle_intrinsic(spot: Decimal, strike: Decimal) -> Decimal {
    (spot - strike).max(Decimal::ZERO) + (strike - spot).max(Decimal::ZERO)
}
