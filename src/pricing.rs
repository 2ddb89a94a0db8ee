//! Session pricing. All arithmetic is decimal with half-up rounding at cents.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Share of each payment kept by the platform.
pub const PLATFORM_FEE_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub amount: Decimal,
    pub platform_fee: Decimal,
}

/// Half-up to cents, always carrying two decimal places.
fn round_cents(value: Decimal) -> Decimal {
    let mut cents = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    cents.rescale(2);
    cents
}

/// Price a session of `duration_minutes` at `hourly_rate`, or `None` if the
/// amount does not fit in a `Decimal`.
///
/// The per-minute rate is rounded to cents before it is multiplied out, so a
/// rate of 50/h bills 0.83/min.
pub fn quote(hourly_rate: Decimal, duration_minutes: i64) -> Option<Quote> {
    let per_minute = round_cents(hourly_rate.checked_div(Decimal::from(60))?);
    let amount = round_cents(per_minute.checked_mul(Decimal::from(duration_minutes))?);
    let platform_fee = round_cents(amount.checked_mul(PLATFORM_FEE_RATE)?);
    Some(Quote { amount, platform_fee })
}

/// Amount in minor currency units (cents), truncated. `None` if it does not
/// fit in an `i64`.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    amount.checked_mul(Decimal::ONE_HUNDRED)?.trunc().to_i64()
}
