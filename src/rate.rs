//! Parsing of rate limit arguments such as `200`, `1m` or `512b`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateError {
    #[error("expected a number optionally followed by g, m, k or b")]
    MissingNumber,
    #[error("unknown rate unit '{0}'")]
    BadUnit(String),
    #[error("rate is too large")]
    Overflow,
}

/// Parse a rate in bytes per second.
///
/// The number is taken in kilobytes unless followed by exactly one of
/// `g`, `m`, `k` or `b` (case-insensitive). Values that do not fit in a
/// `u64` after scaling are rejected.
pub fn parse_rate(value: &str) -> Result<u64, RateError> {
    let digits = value.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return Err(RateError::MissingNumber);
    }
    let (number, unit) = value.split_at(digits);
    let amount: u64 = number.parse().map_err(|_| RateError::Overflow)?;

    let shift = match unit {
        "" | "k" | "K" => 10,
        "g" | "G" => 30,
        "m" | "M" => 20,
        "b" | "B" => 0,
        other => return Err(RateError::BadUnit(other.to_string())),
    };
    amount.checked_mul(1 << shift).ok_or(RateError::Overflow)
}
