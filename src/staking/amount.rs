// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Strict decimal amount and percentage parsing.
//!
//! Amounts travel as strings on the wire and in contract metadata and are
//! held as [`Decimal`] in memory. Nothing here goes through `f64`.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// Maximum digits accepted before the decimal point.
pub const MAX_WHOLE_DIGITS: usize = 15;
/// Maximum digits accepted after the decimal point.
pub const MAX_FRACTION_DIGITS: usize = 12;

/// Why an amount or percentage string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("value is empty")]
    Empty,
    #[error("value must be a plain decimal number (digits with an optional fractional part)")]
    Malformed,
    #[error("value has too many digits")]
    TooLarge,
    #[error("value must be greater than zero")]
    NotPositive,
    #[error("percentage must look like \"N%\"")]
    MissingPercentSign,
}

/// Parse a non-negative decimal string matching `^[0-9]+(\.[0-9]+)?$`.
///
/// Signs, exponents, whitespace, separators and bare dots are rejected.
pub fn parse_decimal(raw: &str) -> Result<Decimal, AmountError> {
    if raw.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole, fraction) = match raw.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (raw, None),
    };

    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AmountError::Malformed);
    }
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::Malformed);
        }
        if fraction.len() > MAX_FRACTION_DIGITS {
            return Err(AmountError::TooLarge);
        }
    }
    if whole.trim_start_matches('0').len() > MAX_WHOLE_DIGITS {
        return Err(AmountError::TooLarge);
    }

    Decimal::from_str(raw).map_err(|_| AmountError::TooLarge)
}

/// Parse a strictly positive amount.
pub fn parse_positive_amount(raw: &str) -> Result<Decimal, AmountError> {
    let value = parse_decimal(raw)?;
    if value <= Decimal::ZERO {
        return Err(AmountError::NotPositive);
    }
    Ok(value)
}

/// Parse an `"N%"` percentage string into a fraction (`"1%"` -> `0.01`).
pub fn parse_percentage(raw: &str) -> Result<Decimal, AmountError> {
    let number = raw
        .strip_suffix('%')
        .ok_or(AmountError::MissingPercentSign)?;
    let percent = parse_decimal(number)?;
    if percent <= Decimal::ZERO {
        return Err(AmountError::NotPositive);
    }
    Ok(percent / Decimal::ONE_HUNDRED)
}

/// Render a fraction back as an `"N%"` string (`0.01` -> `"1%"`).
pub fn format_percentage(fraction: Decimal) -> String {
    format!("{}%", (fraction * Decimal::ONE_HUNDRED).normalize())
}

/// Cut `value` down to the precision a request may carry, rounding toward
/// zero. Computed payouts go through this so every amount the service
/// reports can be asked for back.
pub fn quantize(value: Decimal) -> Decimal {
    value
        .round_dp_with_strategy(MAX_FRACTION_DIGITS as u32, RoundingStrategy::ToZero)
        .normalize()
}

/// Canonical string form used on the wire and in metadata.
pub fn format_amount(value: Decimal) -> String {
    value.normalize().to_string()
}
