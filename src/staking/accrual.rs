// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Accrual calculator.
//!
//! Pure function of the persisted contract and "now". Interval counts use
//! floor division so partial intervals never accrue early; amounts are never
//! truncated. The accrual window is clamped to `[start_ts, end_ts]`.
//!
//! Withdrawable amounts are computed from the last withdrawal time, so a
//! withdrawal restarts the interval count. Whatever fraction of an interval
//! had elapsed at that moment does not carry over.

use rust_decimal::Decimal;

use super::contract::StakingContract;

/// Accrual figures at one instant.
///
/// Amounts are in the payout currency unless the field says otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccrualSnapshot {
    pub as_of: i64,
    pub elapsed_intervals_since_start: u64,
    /// `None` before the first withdrawal.
    pub elapsed_intervals_since_last_withdrawal: Option<u64>,
    pub entitled_to_date: Decimal,
    pub withdrawable_now: Decimal,
    pub already_withdrawn_for_display: Decimal,
    /// Principal plus interest accrued so far, in the principal currency.
    pub total_value_now: Decimal,
    pub total_entitlement: Decimal,
    /// Principal plus full-term interest, in the principal currency.
    pub total_value_at_maturity: Decimal,
}

/// Whole intervals between `from` and `to`, zero if `to <= from`.
fn whole_intervals(from: i64, to: i64, interval_seconds: i64) -> u64 {
    if interval_seconds <= 0 || to <= from {
        return 0;
    }
    u64::try_from((to - from) / interval_seconds).unwrap_or(0)
}

fn payout_for(intervals: u64, per_interval: Decimal) -> Decimal {
    Decimal::from(intervals).saturating_mul(per_interval)
}

pub fn accrue(contract: &StakingContract, now: i64) -> AccrualSnapshot {
    let schedule = &contract.schedule;
    let terms = schedule.terms();
    let interval_seconds = schedule.interval_seconds();
    let effective_now = now.min(schedule.end_ts);

    let since_start = whole_intervals(schedule.start_ts, effective_now, interval_seconds);
    let entitled_to_date = payout_for(since_start, terms.interval_payout_amount);

    let last = contract.counters.last_withdrawal_ts;
    let (since_last, withdrawable_now, already_withdrawn_for_display) = if last == 0 {
        (None, entitled_to_date, Decimal::ZERO)
    } else {
        let since_last = whole_intervals(last, effective_now, interval_seconds);
        let withdrawable = payout_for(since_last, terms.interval_payout_amount);
        let shown = (entitled_to_date - withdrawable).max(Decimal::ZERO);
        (Some(since_last), withdrawable, shown)
    };

    let principal_entitled = payout_for(since_start, schedule.principal_interval_payout());

    AccrualSnapshot {
        as_of: now,
        elapsed_intervals_since_start: since_start,
        elapsed_intervals_since_last_withdrawal: since_last,
        entitled_to_date,
        withdrawable_now,
        already_withdrawn_for_display,
        total_value_now: schedule.principal_amount.saturating_add(principal_entitled),
        total_entitlement: terms.total_entitlement,
        total_value_at_maturity: schedule
            .principal_amount
            .saturating_add(schedule.principal_total_entitlement()),
    }
}
