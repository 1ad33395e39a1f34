// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Staking error taxonomy.
//!
//! Every rejection carries the quantities that caused it so a caller can
//! self-diagnose. Missing or malformed bearer credentials are reported by
//! [`crate::auth::AuthError`] before any of these can occur.

use rust_decimal::Decimal;
use serde_json::{json, Value};

use super::amount::format_amount;
use crate::providers::CollaboratorError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StakingError {
    /// Plan selection outside the operator allow-list.
    #[error("invalid plan parameter `{field}`: {reason}")]
    InvalidPlanParameter { field: &'static str, reason: String },

    /// Request body failed shape validation.
    #[error("invalid request field `{field}`: {reason}")]
    InvalidRequest { field: &'static str, reason: String },

    #[error("contract {contract_id} not found")]
    NotFound { contract_id: String },

    /// The body names a user the caller may not act for, or a contract that
    /// user does not own.
    #[error("not permitted to act for user {user_id}")]
    Forbidden {
        contract_id: Option<String>,
        user_id: String,
    },

    #[error("withdrawal not yet eligible: now {now}, eligible at {eligible_at}")]
    NotYetEligible { now: i64, eligible_at: i64 },

    #[error("request {request_id} was already processed for this contract")]
    DuplicateRequest {
        request_id: String,
        transaction_id: Option<String>,
    },

    #[error("requested {requested} exceeds accrued withdrawable amount {withdrawable_now}")]
    ExceedsAccrued {
        requested: Decimal,
        withdrawable_now: Decimal,
    },

    #[error("requested {requested} exceeds contract remainder {remaining_to_be_paid}")]
    ExceedsContractRemainder {
        requested: Decimal,
        remaining_to_be_paid: Decimal,
    },

    /// A previous withdrawal left a reservation that an operator must settle.
    #[error("contract {contract_id} has an unreconciled withdrawal {pending_request_id}")]
    ReconciliationRequired {
        contract_id: String,
        pending_request_id: String,
    },

    #[error("ledger declined {operation}: {message}")]
    LedgerDeclined {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} failed: {message}")]
    CollaboratorUnavailable {
        operation: &'static str,
        message: String,
        details: Value,
    },

    /// One leg of a two-call sequence succeeded and the other did not.
    #[error("partial failure: {message}")]
    PartialFailure { message: String, details: Value },
}

impl StakingError {
    pub fn invalid_request(field: &'static str, reason: impl Into<String>) -> Self {
        StakingError::InvalidRequest {
            field,
            reason: reason.into(),
        }
    }

    pub fn invalid_plan(field: &'static str, reason: impl Into<String>) -> Self {
        StakingError::InvalidPlanParameter {
            field,
            reason: reason.into(),
        }
    }

    /// Map a collaborator failure for `operation` into the taxonomy.
    pub fn from_collaborator(operation: &'static str, error: CollaboratorError) -> Self {
        match error {
            CollaboratorError::Rejected(message) => StakingError::LedgerDeclined { operation, message },
            other => StakingError::CollaboratorUnavailable {
                operation,
                message: other.to_string(),
                details: Value::Null,
            },
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            StakingError::InvalidPlanParameter { .. } => "invalid_plan_parameter",
            StakingError::InvalidRequest { .. } => "invalid_request",
            StakingError::NotFound { .. } => "not_found",
            StakingError::Forbidden { .. } => "forbidden",
            StakingError::NotYetEligible { .. } => "not_yet_eligible",
            StakingError::DuplicateRequest { .. } => "duplicate_request",
            StakingError::ExceedsAccrued { .. } => "exceeds_accrued",
            StakingError::ExceedsContractRemainder { .. } => "exceeds_contract_remainder",
            StakingError::ReconciliationRequired { .. } => "reconciliation_required",
            StakingError::LedgerDeclined { .. } => "ledger_declined",
            StakingError::CollaboratorUnavailable { .. } => "collaborator_unavailable",
            StakingError::PartialFailure { .. } => "partial_failure",
        }
    }

    /// Diagnostic quantities for the error body.
    pub fn details(&self) -> Value {
        match self {
            StakingError::InvalidPlanParameter { field, reason }
            | StakingError::InvalidRequest { field, reason } => {
                json!({ "field": field, "reason": reason })
            }
            StakingError::NotFound { contract_id } => json!({ "contract_id": contract_id }),
            StakingError::Forbidden {
                contract_id,
                user_id,
            } => json!({ "contract_id": contract_id, "user_id": user_id }),
            StakingError::NotYetEligible { now, eligible_at } => json!({
                "now": now,
                "eligible_at": eligible_at,
                "seconds_remaining": eligible_at.saturating_sub(*now),
            }),
            StakingError::DuplicateRequest {
                request_id,
                transaction_id,
            } => json!({ "request_id": request_id, "transaction_id": transaction_id }),
            StakingError::ExceedsAccrued {
                requested,
                withdrawable_now,
            } => json!({
                "requested": format_amount(*requested),
                "withdrawable_now": format_amount(*withdrawable_now),
            }),
            StakingError::ExceedsContractRemainder {
                requested,
                remaining_to_be_paid,
            } => json!({
                "requested": format_amount(*requested),
                "remaining_to_be_paid": format_amount(*remaining_to_be_paid),
            }),
            StakingError::ReconciliationRequired {
                contract_id,
                pending_request_id,
            } => json!({
                "contract_id": contract_id,
                "pending_request_id": pending_request_id,
            }),
            StakingError::LedgerDeclined { operation, message } => {
                json!({ "operation": operation, "ledger_message": message })
            }
            StakingError::CollaboratorUnavailable {
                operation, details, ..
            } => json!({ "operation": operation, "context": details }),
            StakingError::PartialFailure { details, .. } => details.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn exceeds_accrued_reports_both_quantities() {
        let err = StakingError::ExceedsAccrued {
            requested: Decimal::from_str("3.50").unwrap(),
            withdrawable_now: Decimal::ZERO,
        };
        assert_eq!(err.code(), "exceeds_accrued");
        let details = err.details();
        assert_eq!(details["requested"], "3.5");
        assert_eq!(details["withdrawable_now"], "0");
    }

    #[test]
    fn not_yet_eligible_reports_remaining_seconds() {
        let err = StakingError::NotYetEligible {
            now: 100,
            eligible_at: 160,
        };
        assert_eq!(err.details()["seconds_remaining"], 60);
    }

    #[test]
    fn rejected_collaborator_call_becomes_ledger_declined() {
        let err = StakingError::from_collaborator(
            "debit",
            CollaboratorError::Rejected("insufficient balance".to_string()),
        );
        assert!(matches!(err, StakingError::LedgerDeclined { operation: "debit", .. }));

        let err = StakingError::from_collaborator(
            "credit",
            CollaboratorError::Unavailable("timeout".to_string()),
        );
        assert_eq!(err.code(), "collaborator_unavailable");
    }
}
