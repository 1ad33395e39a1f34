// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request body shape validation.
//!
//! Bodies arrive as raw JSON so every field can be reported precisely as
//! `InvalidRequest { field, reason }` instead of a generic deserializer error.

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use super::amount::{parse_positive_amount, AmountError};
use super::error::StakingError;
use super::schedule::{PatternSelection, PlanSelection};

/// A shape-valid withdrawal request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalRequest {
    pub request_id: String,
    pub user_id: String,
    pub amount: Decimal,
}

/// A shape-valid stake creation request.
#[derive(Debug, Clone)]
pub struct StakeRequest {
    pub request_id: String,
    pub selection: PlanSelection,
}

/// Operator's verdict on an unreconciled withdrawal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The ledger did pay out; record the receipt.
    Credited { transaction_id: String },
    /// Nothing was paid; restore the counters.
    NotCredited,
}

fn object(body: &Value) -> Result<&Map<String, Value>, StakingError> {
    body.as_object()
        .ok_or_else(|| StakingError::invalid_request("body", "must be a JSON object"))
}

fn required_string(map: &Map<String, Value>, field: &'static str) -> Result<String, StakingError> {
    match map.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(StakingError::invalid_request(field, "must not be empty")),
        Some(_) => Err(StakingError::invalid_request(field, "must be a string")),
        None => Err(StakingError::invalid_request(field, "is required")),
    }
}

fn optional_string(map: &Map<String, Value>, field: &'static str) -> Result<Option<String>, StakingError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_string(map, field).map(Some),
    }
}

/// Non-negative integer given as a JSON number or a string of digits.
fn numeric(map: &Map<String, Value>, field: &'static str) -> Result<String, StakingError> {
    match map.get(field) {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|v| v.to_string())
            .ok_or_else(|| StakingError::invalid_request(field, "must be a non-negative integer")),
        Some(Value::String(s)) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => Ok(s.clone()),
        Some(_) => Err(StakingError::invalid_request(field, "must be numeric")),
        None => Err(StakingError::invalid_request(field, "is required")),
    }
}

/// Strict positive decimal string: no spaces, signs or exponents.
fn amount(map: &Map<String, Value>, field: &'static str) -> Result<Decimal, StakingError> {
    match map.get(field) {
        Some(Value::String(s)) => parse_positive_amount(s).map_err(|e| match e {
            AmountError::NotPositive => StakingError::invalid_request(field, "must be greater than zero"),
            other => StakingError::invalid_request(field, other.to_string()),
        }),
        Some(_) => Err(StakingError::invalid_request(field, "must be a decimal string")),
        None => Err(StakingError::invalid_request(field, "is required")),
    }
}

pub fn parse_withdrawal(body: &Value) -> Result<WithdrawalRequest, StakingError> {
    let map = object(body)?;
    Ok(WithdrawalRequest {
        request_id: required_string(map, "request_id")?,
        user_id: numeric(map, "user_id")?,
        amount: amount(map, "amount_to_withdraw")?,
    })
}

pub fn parse_stake(body: &Value) -> Result<StakeRequest, StakingError> {
    let map = object(body)?;
    let request_id = required_string(map, "request_id")?;
    let user_id = numeric(map, "user_id")?;
    let plan_id = required_string(map, "plan_id")?;
    let principal_amount = amount(map, "principal_amount")?;
    let principal_wallet = required_string(map, "principal_wallet")?;
    let interval_kind = required_string(map, "interval_kind")?;
    let interval_count = numeric(map, "interval_count")?
        .parse::<u64>()
        .map_err(|_| StakingError::invalid_request("interval_count", "out of range"))?;
    let interval_payout_percentage = required_string(map, "interval_payout_percentage")?;
    let payout_wallet = optional_string(map, "payout_wallet")?;

    let pattern = match optional_string(map, "payment_pattern")?.as_deref() {
        None | Some("direct") => PatternSelection::Direct { payout_wallet },
        Some("cross_wallet") => PatternSelection::CrossWallet {
            payout_wallet: payout_wallet.ok_or_else(|| {
                StakingError::invalid_request("payout_wallet", "is required for cross_wallet")
            })?,
        },
        Some(_) => {
            return Err(StakingError::invalid_request(
                "payment_pattern",
                "must be `direct` or `cross_wallet`",
            ))
        }
    };

    Ok(StakeRequest {
        request_id,
        selection: PlanSelection {
            user_id,
            plan_id,
            principal_amount,
            principal_wallet,
            interval_kind,
            interval_count,
            interval_payout_percentage,
            pattern,
        },
    })
}

pub fn parse_reconcile(body: &Value) -> Result<ReconcileOutcome, StakingError> {
    let map = object(body)?;
    match required_string(map, "outcome")?.as_str() {
        "credited" => Ok(ReconcileOutcome::Credited {
            transaction_id: required_string(map, "transaction_id")?,
        }),
        "not_credited" => Ok(ReconcileOutcome::NotCredited),
        _ => Err(StakingError::invalid_request(
            "outcome",
            "must be `credited` or `not_credited`",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field_of(err: StakingError) -> &'static str {
        match err {
            StakingError::InvalidRequest { field, .. } => field,
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn valid_withdrawal_body() {
        let req = parse_withdrawal(&json!({
            "request_id": "r1",
            "user_id": 42,
            "amount_to_withdraw": "3.25"
        }))
        .unwrap();
        assert_eq!(req.user_id, "42");
        assert_eq!(req.amount, Decimal::new(325, 2));

        let req = parse_withdrawal(&json!({
            "request_id": "r1",
            "user_id": "42",
            "amount_to_withdraw": "3"
        }))
        .unwrap();
        assert_eq!(req.user_id, "42");
    }

    #[test]
    fn withdrawal_amount_is_strict() {
        for bad in [" 3", "+3", "-3", "3e2", "3.", ".5", "1,000", "0", "0.00"] {
            let err = parse_withdrawal(&json!({
                "request_id": "r1",
                "user_id": 42,
                "amount_to_withdraw": bad
            }))
            .unwrap_err();
            assert_eq!(field_of(err), "amount_to_withdraw", "accepted {bad:?}");
        }

        let err = parse_withdrawal(&json!({
            "request_id": "r1",
            "user_id": 42,
            "amount_to_withdraw": 3
        }))
        .unwrap_err();
        assert_eq!(field_of(err), "amount_to_withdraw");
    }

    #[test]
    fn withdrawal_fields_are_checked_in_order() {
        let err = parse_withdrawal(&json!({ "user_id": "abc" })).unwrap_err();
        assert_eq!(field_of(err), "request_id");

        let err = parse_withdrawal(&json!({ "request_id": "", "user_id": 1 })).unwrap_err();
        assert_eq!(field_of(err), "request_id");

        let err = parse_withdrawal(&json!({ "request_id": "r", "user_id": "4a" })).unwrap_err();
        assert_eq!(field_of(err), "user_id");

        let err = parse_withdrawal(&json!({ "request_id": "r", "user_id": -1 })).unwrap_err();
        assert_eq!(field_of(err), "user_id");

        let err = parse_withdrawal(&json!([1, 2])).unwrap_err();
        assert_eq!(field_of(err), "body");
    }

    #[test]
    fn stake_body_defaults_to_direct() {
        let req = parse_stake(&json!({
            "request_id": "s1",
            "user_id": 42,
            "plan_id": "starter",
            "principal_amount": "100",
            "principal_wallet": "usdt",
            "interval_kind": "every_minute",
            "interval_count": 5,
            "interval_payout_percentage": "1%"
        }))
        .unwrap();
        assert_eq!(req.request_id, "s1");
        assert_eq!(req.selection.interval_count, 5);
        assert_eq!(
            req.selection.pattern,
            PatternSelection::Direct { payout_wallet: None }
        );
    }

    #[test]
    fn cross_wallet_stake_requires_payout_wallet() {
        let body = json!({
            "request_id": "s1",
            "user_id": 42,
            "plan_id": "starter",
            "principal_amount": "100",
            "principal_wallet": "usdt",
            "interval_kind": "every_minute",
            "interval_count": "5",
            "interval_payout_percentage": "1%",
            "payment_pattern": "cross_wallet"
        });
        assert_eq!(field_of(parse_stake(&body).unwrap_err()), "payout_wallet");

        let mut body = body;
        body["payment_pattern"] = json!("swap");
        assert_eq!(field_of(parse_stake(&body).unwrap_err()), "payment_pattern");
    }

    #[test]
    fn reconcile_outcomes() {
        assert_eq!(
            parse_reconcile(&json!({ "outcome": "credited", "transaction_id": "tx-9" })).unwrap(),
            ReconcileOutcome::Credited {
                transaction_id: "tx-9".to_string()
            }
        );
        assert_eq!(
            parse_reconcile(&json!({ "outcome": "not_credited" })).unwrap(),
            ReconcileOutcome::NotCredited
        );
        assert_eq!(
            field_of(parse_reconcile(&json!({ "outcome": "credited" })).unwrap_err()),
            "transaction_id"
        );
        assert_eq!(
            field_of(parse_reconcile(&json!({ "outcome": "maybe" })).unwrap_err()),
            "outcome"
        );
    }
}
