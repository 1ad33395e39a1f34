// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response shapes for the staking endpoints. Every monetary
//! value crosses the wire as a decimal string so no precision is lost to
//! JSON floats.
//!
//! Handlers accept raw JSON and validate it in [`crate::staking::request`];
//! the request types here exist for the OpenAPI document.
//!
//! ## Envelope
//!
//! Successful responses are wrapped in [`ApiResponse`]:
//!
//! ```json
//! { "status": true, "status_code": 200, "message": "...", "data": { ... } }
//! ```
//!
//! Failures use [`crate::error::ErrorEnvelope`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::staking::amount::{format_amount, format_percentage};
use crate::staking::contract::{PendingWithdrawal, PaymentPattern, Schedule, WithdrawalPolicy};
use crate::staking::{AccrualSnapshot, ContractState, IntervalKind, RoiView, StakeCreated, StakingContract, WithdrawalResult};

// =============================================================================
// Envelope
// =============================================================================

/// Success envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Always `true`.
    pub status: bool,
    pub status_code: u16,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::OK, message, data)
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::CREATED, message, data)
    }

    fn with_status(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            status: true,
            status_code: status.as_u16(),
            message: message.into(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Request to open a staking contract.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateStakeRequest {
    /// Caller-chosen idempotency key for the principal debit.
    pub request_id: String,
    /// Contract owner. Numeric or string.
    #[schema(value_type = String, example = "42")]
    pub user_id: serde_json::Value,
    pub plan_id: String,
    /// Decimal string, e.g. `"100"`.
    pub principal_amount: String,
    pub principal_wallet: String,
    #[schema(example = "every_minute")]
    pub interval_kind: String,
    pub interval_count: u64,
    /// Percentage string, e.g. `"1%"` or `"0.5"`.
    pub interval_payout_percentage: String,
    /// `direct` (default) or `cross_wallet`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_pattern: Option<String>,
    /// Required for `cross_wallet`; defaults to `principal_wallet` for `direct`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_wallet: Option<String>,
}

/// Request to withdraw accrued ROI.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WithdrawRoiRequest {
    /// Idempotency key. Replays return `duplicate_request`.
    pub request_id: String,
    #[schema(value_type = String, example = "42")]
    pub user_id: serde_json::Value,
    /// Decimal string in the payout currency.
    pub amount_to_withdraw: String,
}

/// Operator settlement of a stuck withdrawal reservation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReconcileRequest {
    /// `credited` if the payout credit landed, `not_credited` otherwise.
    pub outcome: String,
    /// Ledger transaction of the payout credit. Required for `credited`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

// =============================================================================
// Responses
// =============================================================================

/// Immutable terms of a contract.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScheduleResponse {
    pub plan_id: String,
    pub principal_amount: String,
    pub principal_wallet: String,
    pub interval_kind: IntervalKind,
    /// e.g. `"5 minutes"`.
    pub interval_label: String,
    pub interval_seconds: i64,
    pub interval_count: u64,
    /// e.g. `"1%"`.
    pub interval_payout_percentage: String,
    /// `direct` or `cross_wallet`.
    pub payment_pattern: String,
    pub payout_wallet: String,
    /// Frozen at creation. Present for `cross_wallet` only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_rate: Option<String>,
    /// Per-interval payout in the payout currency.
    pub interval_payout_amount: String,
    /// Full-term payout in the payout currency.
    pub total_entitlement: String,
    pub principal_interval_payout_amount: String,
    pub principal_total_entitlement: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub first_withdrawal_eligible_ts: i64,
    /// `continuous` or `windowed`.
    pub withdrawal_policy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawal_window_intervals: Option<u64>,
}

impl From<&Schedule> for ScheduleResponse {
    fn from(schedule: &Schedule) -> Self {
        let terms = schedule.terms();
        let window = match schedule.withdrawal_policy {
            WithdrawalPolicy::Continuous => None,
            WithdrawalPolicy::Windowed { window_intervals } => Some(window_intervals),
        };
        Self {
            plan_id: schedule.plan_id.clone(),
            principal_amount: format_amount(schedule.principal_amount),
            principal_wallet: schedule.principal_wallet.clone(),
            interval_kind: schedule.interval_kind,
            interval_label: schedule.interval_kind.describe(schedule.interval_count),
            interval_seconds: schedule.interval_seconds(),
            interval_count: schedule.interval_count,
            interval_payout_percentage: format_percentage(schedule.interval_payout_percentage),
            payment_pattern: schedule.payment.as_str().to_string(),
            payout_wallet: terms.payout_wallet.clone(),
            exchange_rate: match &schedule.payment {
                PaymentPattern::Direct(_) => None,
                PaymentPattern::CrossWallet { exchange_rate, .. } => Some(format_amount(*exchange_rate)),
            },
            interval_payout_amount: format_amount(terms.interval_payout_amount),
            total_entitlement: format_amount(terms.total_entitlement),
            principal_interval_payout_amount: format_amount(schedule.principal_interval_payout()),
            principal_total_entitlement: format_amount(schedule.principal_total_entitlement()),
            start_ts: schedule.start_ts,
            end_ts: schedule.end_ts,
            first_withdrawal_eligible_ts: schedule.first_withdrawal_eligible_ts,
            withdrawal_policy: schedule.withdrawal_policy.as_str().to_string(),
            withdrawal_window_intervals: window,
        }
    }
}

/// Mutable payout counters.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CountersResponse {
    pub remaining_to_be_paid: String,
    pub withdrawn_so_far: String,
    /// Equals `start_ts` until the first withdrawal.
    pub last_withdrawal_ts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_withdrawal_ts: Option<i64>,
}

impl From<&StakingContract> for CountersResponse {
    fn from(contract: &StakingContract) -> Self {
        Self {
            remaining_to_be_paid: format_amount(contract.counters.remaining_to_be_paid),
            withdrawn_so_far: format_amount(contract.counters.withdrawn_so_far),
            last_withdrawal_ts: contract.counters.last_withdrawal_ts,
            next_withdrawal_ts: contract.next_withdrawal_ts,
        }
    }
}

/// Accrual figures at `as_of`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccrualResponse {
    pub as_of: i64,
    pub elapsed_intervals_since_start: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_intervals_since_last_withdrawal: Option<u64>,
    pub entitled_to_date: String,
    pub withdrawable_now: String,
    pub already_withdrawn: String,
    /// Principal plus accrued interest, in the principal currency.
    pub total_value_now: String,
    pub total_entitlement: String,
    pub total_value_at_maturity: String,
}

impl From<&AccrualSnapshot> for AccrualResponse {
    fn from(snapshot: &AccrualSnapshot) -> Self {
        Self {
            as_of: snapshot.as_of,
            elapsed_intervals_since_start: snapshot.elapsed_intervals_since_start,
            elapsed_intervals_since_last_withdrawal: snapshot.elapsed_intervals_since_last_withdrawal,
            entitled_to_date: format_amount(snapshot.entitled_to_date),
            withdrawable_now: format_amount(snapshot.withdrawable_now),
            already_withdrawn: format_amount(snapshot.already_withdrawn_for_display),
            total_value_now: format_amount(snapshot.total_value_now),
            total_entitlement: format_amount(snapshot.total_entitlement),
            total_value_at_maturity: format_amount(snapshot.total_value_at_maturity),
        }
    }
}

/// An in-flight withdrawal reservation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PendingWithdrawalResponse {
    pub request_id: String,
    pub amount: String,
    pub reserved_at: i64,
}

impl From<&PendingWithdrawal> for PendingWithdrawalResponse {
    fn from(pending: &PendingWithdrawal) -> Self {
        Self {
            request_id: pending.request_id.clone(),
            amount: format_amount(pending.amount),
            reserved_at: pending.reserved_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StakeCreatedResponse {
    /// Ledger transaction id of the locked credit.
    pub contract_id: String,
    pub user_id: String,
    pub debit_transaction_id: String,
    pub state: ContractState,
    pub schedule: ScheduleResponse,
    pub counters: CountersResponse,
}

impl From<&StakeCreated> for StakeCreatedResponse {
    fn from(created: &StakeCreated) -> Self {
        let contract = &created.contract;
        Self {
            contract_id: contract.contract_id.clone(),
            user_id: contract.schedule.user_id.clone(),
            debit_transaction_id: created.debit_transaction_id.clone(),
            state: contract.state_at(contract.schedule.start_ts),
            schedule: ScheduleResponse::from(&contract.schedule),
            counters: CountersResponse::from(contract),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WithdrawalResponse {
    pub contract_id: String,
    pub request_id: String,
    /// Ledger transaction id of the payout credit.
    pub transaction_id: String,
    pub amount: String,
    pub payout_wallet: String,
    pub withdrawn_at: i64,
    pub counters: CountersResponse,
    pub accrual: AccrualResponse,
}

impl From<&WithdrawalResult> for WithdrawalResponse {
    fn from(result: &WithdrawalResult) -> Self {
        let contract = &result.outcome.contract;
        let receipt = &result.outcome.receipt;
        Self {
            contract_id: contract.contract_id.clone(),
            request_id: receipt.request_id.clone(),
            transaction_id: receipt.transaction_id.clone(),
            amount: format_amount(receipt.amount),
            payout_wallet: contract.schedule.terms().payout_wallet.clone(),
            withdrawn_at: receipt.withdrawn_at,
            counters: CountersResponse::from(contract),
            accrual: AccrualResponse::from(&result.snapshot),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoiResponse {
    pub contract_id: String,
    pub user_id: String,
    pub state: ContractState,
    /// Earliest time the next withdrawal may be made.
    pub eligible_at: i64,
    pub schedule: ScheduleResponse,
    pub counters: CountersResponse,
    pub accrual: AccrualResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_withdrawal: Option<PendingWithdrawalResponse>,
}

impl From<&RoiView> for RoiResponse {
    fn from(view: &RoiView) -> Self {
        Self {
            contract_id: view.contract.contract_id.clone(),
            user_id: view.contract.schedule.user_id.clone(),
            state: view.state,
            eligible_at: view.eligible_at,
            schedule: ScheduleResponse::from(&view.contract.schedule),
            counters: CountersResponse::from(&view.contract),
            accrual: AccrualResponse::from(&view.snapshot),
            pending_withdrawal: view.contract.pending.as_ref().map(PendingWithdrawalResponse::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReconcileResponse {
    pub contract_id: String,
    pub counters: CountersResponse,
}

impl From<&StakingContract> for ReconcileResponse {
    fn from(contract: &StakingContract) -> Self {
        Self {
            contract_id: contract.contract_id.clone(),
            counters: CountersResponse::from(contract),
        }
    }
}
