// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Schedule builder: turns a plan selection into an immutable accrual schedule.
//!
//! Validation runs against the operator [`PlanPolicy`] before any collaborator
//! is called. For cross-wallet plans the caller fetches the exchange rate once
//! and passes it to [`ValidatedPlan::build`]; the rate is then frozen in the
//! contract for its whole life.

use rust_decimal::Decimal;

use super::amount::{format_percentage, quantize};
use super::contract::{PaymentPattern, PayoutTerms, Schedule};
use super::error::StakingError;
use super::interval::IntervalKind;
use crate::config::PlanPolicy;

/// Which currency interest is paid in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSelection {
    /// Pay into `payout_wallet`, defaulting to the principal wallet.
    Direct { payout_wallet: Option<String> },
    /// Pay into a different currency's wallet at a rate frozen now.
    CrossWallet { payout_wallet: String },
}

/// Caller's plan choice, after request shape validation.
#[derive(Debug, Clone)]
pub struct PlanSelection {
    pub user_id: String,
    pub plan_id: String,
    pub principal_amount: Decimal,
    pub principal_wallet: String,
    /// Raw interval table key.
    pub interval_kind: String,
    pub interval_count: u64,
    /// Raw `"N%"` string.
    pub interval_payout_percentage: String,
    pub pattern: PatternSelection,
}

/// A selection that passed the allow-list.
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    selection: PlanSelection,
    interval_kind: IntervalKind,
    percentage: Decimal,
    first_withdrawal_delay: u64,
    withdrawal_policy: super::contract::WithdrawalPolicy,
}

impl ValidatedPlan {
    pub fn selection(&self) -> &PlanSelection {
        &self.selection
    }

    /// `(principal_wallet, payout_wallet)` when a rate snapshot is needed.
    pub fn rate_pair(&self) -> Option<(&str, &str)> {
        match &self.selection.pattern {
            PatternSelection::Direct { .. } => None,
            PatternSelection::CrossWallet { payout_wallet } => {
                Some((self.selection.principal_wallet.as_str(), payout_wallet.as_str()))
            }
        }
    }

    /// Compute the full schedule starting at `start_ts`.
    ///
    /// `exchange_rate` is required for cross-wallet plans and ignored otherwise.
    pub fn build(self, start_ts: i64, exchange_rate: Option<Decimal>) -> Result<Schedule, StakingError> {
        let interval_seconds = self.interval_kind.seconds();
        let count = self.selection.interval_count;

        let exact_interval_payout = self
            .selection
            .principal_amount
            .checked_mul(self.percentage)
            .ok_or_else(|| StakingError::invalid_plan("principal_amount", "payout overflows"))?;
        let principal_interval_payout = payout_unit(exact_interval_payout)?;
        let principal_total = principal_interval_payout
            .checked_mul(Decimal::from(count))
            .ok_or_else(|| StakingError::invalid_plan("interval_count", "total payout overflows"))?;

        let end_ts = offset(start_ts, count, interval_seconds)
            .ok_or_else(|| StakingError::invalid_plan("interval_count", "end time overflows"))?;
        let first_withdrawal_eligible_ts = offset(start_ts, self.first_withdrawal_delay, interval_seconds)
            .ok_or_else(|| StakingError::invalid_plan("interval_count", "eligibility time overflows"))?;

        let payment = match self.selection.pattern {
            PatternSelection::Direct { payout_wallet } => PaymentPattern::Direct(PayoutTerms {
                payout_wallet: payout_wallet.unwrap_or_else(|| self.selection.principal_wallet.clone()),
                interval_payout_amount: principal_interval_payout,
                total_entitlement: principal_total,
            }),
            PatternSelection::CrossWallet { payout_wallet } => {
                let rate = exchange_rate
                    .filter(|r| *r > Decimal::ZERO)
                    .ok_or_else(|| StakingError::invalid_plan("payment_pattern", "no exchange rate"))?;
                let interval_payout_amount = exact_interval_payout
                    .checked_mul(rate)
                    .ok_or_else(|| StakingError::invalid_plan("principal_amount", "payout overflows"))
                    .and_then(payout_unit)?;
                let total_entitlement = interval_payout_amount
                    .checked_mul(Decimal::from(count))
                    .ok_or_else(|| StakingError::invalid_plan("interval_count", "total payout overflows"))?;
                PaymentPattern::CrossWallet {
                    terms: PayoutTerms {
                        payout_wallet,
                        interval_payout_amount,
                        total_entitlement,
                    },
                    exchange_rate: rate,
                }
            }
        };

        Ok(Schedule {
            user_id: self.selection.user_id,
            plan_id: self.selection.plan_id,
            principal_amount: self.selection.principal_amount,
            principal_wallet: self.selection.principal_wallet,
            interval_kind: self.interval_kind,
            interval_count: count,
            interval_payout_percentage: self.percentage,
            start_ts,
            end_ts,
            first_withdrawal_eligible_ts,
            withdrawal_policy: self.withdrawal_policy,
            payment,
        })
    }
}

/// Per-interval payouts are held at request precision so `withdrawable_now`
/// can always be withdrawn exactly.
fn payout_unit(exact: Decimal) -> Result<Decimal, StakingError> {
    let payout = quantize(exact);
    if payout <= Decimal::ZERO {
        return Err(StakingError::invalid_plan(
            "principal_amount",
            "per-interval payout is below the smallest amount unit",
        ));
    }
    Ok(payout)
}

fn offset(start_ts: i64, intervals: u64, interval_seconds: i64) -> Option<i64> {
    i64::try_from(intervals)
        .ok()?
        .checked_mul(interval_seconds)?
        .checked_add(start_ts)
}

/// Check a selection against the operator allow-list.
pub fn validate_plan(selection: PlanSelection, policy: &PlanPolicy) -> Result<ValidatedPlan, StakingError> {
    if selection.plan_id.trim().is_empty() {
        return Err(StakingError::invalid_plan("plan_id", "must not be empty"));
    }

    let interval_kind = IntervalKind::parse(&selection.interval_kind).ok_or_else(|| {
        StakingError::invalid_plan(
            "interval_kind",
            format!("unknown interval `{}`", selection.interval_kind),
        )
    })?;
    if !policy.allowed_intervals.contains(&interval_kind) {
        return Err(StakingError::invalid_plan(
            "interval_kind",
            format!("interval `{interval_kind}` is not offered"),
        ));
    }

    if selection.interval_count < policy.min_interval_count
        || selection.interval_count > policy.max_interval_count
    {
        return Err(StakingError::invalid_plan(
            "interval_count",
            format!(
                "must be between {} and {}",
                policy.min_interval_count, policy.max_interval_count
            ),
        ));
    }

    let percentage = super::amount::parse_percentage(&selection.interval_payout_percentage)
        .map_err(|e| StakingError::invalid_plan("interval_payout_percentage", e.to_string()))?;
    if !policy.allowed_percentages.contains(&percentage) {
        let offered: Vec<String> = policy
            .allowed_percentages
            .iter()
            .map(|p| format_percentage(*p))
            .collect();
        return Err(StakingError::invalid_plan(
            "interval_payout_percentage",
            format!("allowed: {}", offered.join(", ")),
        ));
    }

    if let PatternSelection::CrossWallet { payout_wallet } = &selection.pattern {
        if payout_wallet.trim().is_empty() {
            return Err(StakingError::invalid_plan("payout_wallet", "required for cross_wallet"));
        }
        if *payout_wallet == selection.principal_wallet {
            return Err(StakingError::invalid_plan(
                "payout_wallet",
                "must differ from principal_wallet for cross_wallet",
            ));
        }
    }

    Ok(ValidatedPlan {
        selection,
        interval_kind,
        percentage,
        first_withdrawal_delay: policy.first_withdrawal_delay,
        withdrawal_policy: policy.withdrawal_policy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staking::amount::{format_amount, parse_positive_amount, MAX_FRACTION_DIGITS};
    use crate::staking::contract::WithdrawalPolicy;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn selection() -> PlanSelection {
        PlanSelection {
            user_id: "42".to_string(),
            plan_id: "starter".to_string(),
            principal_amount: d("100"),
            principal_wallet: "usdt".to_string(),
            interval_kind: "every_minute".to_string(),
            interval_count: 5,
            interval_payout_percentage: "1%".to_string(),
            pattern: PatternSelection::Direct { payout_wallet: None },
        }
    }

    #[test]
    fn direct_plan_schedule() {
        let schedule = validate_plan(selection(), &PlanPolicy::default())
            .unwrap()
            .build(1_000, None)
            .unwrap();

        assert_eq!(schedule.terms().interval_payout_amount, d("1"));
        assert_eq!(schedule.terms().total_entitlement, d("5"));
        assert_eq!(schedule.terms().payout_wallet, "usdt");
        assert_eq!(schedule.end_ts, 1_000 + 5 * 60);
        assert_eq!(schedule.first_withdrawal_eligible_ts, 1_060);
        assert_eq!(schedule.withdrawal_policy, WithdrawalPolicy::Continuous);
    }

    #[test]
    fn fractional_amounts_keep_precision() {
        let mut sel = selection();
        sel.principal_amount = d("33.33");
        sel.interval_payout_percentage = "0.5%".to_string();
        sel.interval_count = 3;
        let schedule = validate_plan(sel, &PlanPolicy::default())
            .unwrap()
            .build(0, None)
            .unwrap();
        assert_eq!(schedule.terms().interval_payout_amount, d("0.16665"));
        assert_eq!(schedule.terms().total_entitlement, d("0.49995"));
    }

    #[test]
    fn cross_wallet_freezes_rate_into_payout_terms() {
        let mut sel = selection();
        sel.pattern = PatternSelection::CrossWallet {
            payout_wallet: "ngn".to_string(),
        };
        let plan = validate_plan(sel, &PlanPolicy::default()).unwrap();
        assert_eq!(plan.rate_pair(), Some(("usdt", "ngn")));

        let schedule = plan.build(0, Some(d("1500"))).unwrap();
        assert_eq!(schedule.payment.exchange_rate(), Some(d("1500")));
        assert_eq!(schedule.terms().interval_payout_amount, d("1500"));
        assert_eq!(schedule.terms().total_entitlement, d("7500"));
        assert_eq!(schedule.principal_total_entitlement(), d("5"));
    }

    #[test]
    fn payouts_are_held_at_request_precision() {
        let mut sel = selection();
        sel.principal_amount = d("0.123456789012");
        sel.interval_payout_percentage = "12.25%".to_string();
        let policy = PlanPolicy {
            allowed_percentages: vec![d("0.1225")],
            ..PlanPolicy::default()
        };
        let schedule = validate_plan(sel.clone(), &policy).unwrap().build(0, None).unwrap();
        assert_eq!(schedule.terms().interval_payout_amount, d("0.015123456653"));
        assert_eq!(schedule.terms().total_entitlement, d("0.075617283265"));

        sel.pattern = PatternSelection::CrossWallet {
            payout_wallet: "ngn".to_string(),
        };
        let schedule = validate_plan(sel, &policy)
            .unwrap()
            .build(0, Some(d("1234.5678901234")))
            .unwrap();
        let per_interval = schedule.terms().interval_payout_amount;
        assert!(per_interval.scale() <= MAX_FRACTION_DIGITS as u32);
        assert_eq!(parse_positive_amount(&format_amount(per_interval)).unwrap(), per_interval);
        assert_eq!(schedule.terms().total_entitlement, per_interval * Decimal::from(5u64));
    }

    #[test]
    fn dust_payout_is_rejected() {
        let mut sel = selection();
        sel.principal_amount = d("0.000000000001");
        let err = validate_plan(sel, &PlanPolicy::default())
            .unwrap()
            .build(0, None)
            .unwrap_err();
        assert!(matches!(err, StakingError::InvalidPlanParameter { field: "principal_amount", .. }));
    }

    #[test]
    fn cross_wallet_without_rate_is_rejected() {
        let mut sel = selection();
        sel.pattern = PatternSelection::CrossWallet {
            payout_wallet: "ngn".to_string(),
        };
        let plan = validate_plan(sel, &PlanPolicy::default()).unwrap();
        assert!(matches!(
            plan.build(0, None),
            Err(StakingError::InvalidPlanParameter { field: "payment_pattern", .. })
        ));
    }

    #[test]
    fn cross_wallet_needs_distinct_payout_wallet() {
        let mut sel = selection();
        sel.pattern = PatternSelection::CrossWallet {
            payout_wallet: "usdt".to_string(),
        };
        assert!(matches!(
            validate_plan(sel, &PlanPolicy::default()),
            Err(StakingError::InvalidPlanParameter { field: "payout_wallet", .. })
        ));
    }

    #[test]
    fn unknown_interval_is_rejected() {
        let mut sel = selection();
        sel.interval_kind = "fortnightly".to_string();
        assert!(matches!(
            validate_plan(sel, &PlanPolicy::default()),
            Err(StakingError::InvalidPlanParameter { field: "interval_kind", .. })
        ));
    }

    #[test]
    fn interval_outside_allow_list_is_rejected() {
        let policy = PlanPolicy {
            allowed_intervals: vec![IntervalKind::Daily],
            ..PlanPolicy::default()
        };
        assert!(matches!(
            validate_plan(selection(), &policy),
            Err(StakingError::InvalidPlanParameter { field: "interval_kind", .. })
        ));
    }

    #[test]
    fn duration_range_is_enforced() {
        let mut sel = selection();
        sel.interval_count = 0;
        assert!(matches!(
            validate_plan(sel, &PlanPolicy::default()),
            Err(StakingError::InvalidPlanParameter { field: "interval_count", .. })
        ));

        let mut sel = selection();
        sel.interval_count = 1001;
        assert!(validate_plan(sel, &PlanPolicy::default()).is_err());
    }

    #[test]
    fn disallowed_percentage_is_rejected() {
        let mut sel = selection();
        sel.interval_payout_percentage = "3%".to_string();
        let err = validate_plan(sel, &PlanPolicy::default()).unwrap_err();
        assert!(matches!(
            err,
            StakingError::InvalidPlanParameter { field: "interval_payout_percentage", ref reason }
                if reason.contains("1%")
        ));

        let mut sel = selection();
        sel.interval_payout_percentage = "1".to_string();
        assert!(validate_plan(sel, &PlanPolicy::default()).is_err());
    }

    #[test]
    fn windowed_policy_is_captured() {
        let policy = PlanPolicy {
            withdrawal_policy: WithdrawalPolicy::Windowed { window_intervals: 2 },
            first_withdrawal_delay: 3,
            ..PlanPolicy::default()
        };
        let schedule = validate_plan(selection(), &policy).unwrap().build(0, None).unwrap();
        assert_eq!(schedule.first_withdrawal_eligible_ts, 180);
        assert_eq!(
            schedule.withdrawal_policy,
            WithdrawalPolicy::Windowed { window_intervals: 2 }
        );
    }
}
