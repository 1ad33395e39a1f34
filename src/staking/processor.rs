// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Withdrawal processor: reserve, credit, commit.
//!
//! ```text
//! put   counters - amount, last_withdrawal_ts = now, pending = {request}
//! credit payout wallet                      (idempotent per request_id)
//! post  roi_withdrawal_receipt:<request_id>
//! put   pending = null
//! ```
//!
//! The first `put` is the linearization point. If the ledger definitely
//! refused the credit, the counters and timestamps are restored and the
//! reservation cleared. A timeout or unreadable answer may hide a booked
//! credit, so the reservation stays and blocks new withdrawals until an
//! operator reconciles it. The same holds when the restore itself fails.

use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::authorizer::AuthorizedWithdrawal;
use super::contract::{
    clear_pending_patch, counters_patch, receipt_entry, PayoutCounters, PendingWithdrawal, StakingContract,
    WithdrawalPolicy, WithdrawalReceipt,
};
use super::error::StakingError;
use crate::providers::{CollaboratorError, Ledger, LedgerEntry, MetadataMap, MetadataStore};

/// Result of a committed withdrawal.
#[derive(Debug, Clone)]
pub struct WithdrawalOutcome {
    pub contract: StakingContract,
    pub receipt: WithdrawalReceipt,
}

fn payout_metadata(contract: &StakingContract) -> MetadataMap {
    let mut map = MetadataMap::new();
    map.insert("entry_type".into(), json!("roi_withdrawal"));
    map.insert("staking_contract_id".into(), json!(contract.contract_id));
    map.insert("payment_pattern".into(), json!(contract.schedule.payment.as_str()));
    map
}

fn unavailable(operation: &'static str, error: &CollaboratorError, details: Value) -> StakingError {
    StakingError::CollaboratorUnavailable {
        operation,
        message: error.to_string(),
        details,
    }
}

/// Reserve-then-commit a withdrawal that passed authorization.
pub async fn process(
    store: &dyn MetadataStore,
    ledger: &dyn Ledger,
    mut contract: StakingContract,
    authorized: AuthorizedWithdrawal,
) -> Result<WithdrawalOutcome, StakingError> {
    let AuthorizedWithdrawal { request, now, .. } = authorized;
    let amount = request.amount;
    let contract_id = contract.contract_id.clone();

    let previous = contract.counters.clone();
    let previous_next = contract.next_withdrawal_ts;
    let reserved = PayoutCounters {
        remaining_to_be_paid: previous.remaining_to_be_paid - amount,
        withdrawn_so_far: previous.withdrawn_so_far + amount,
        last_withdrawal_ts: now,
    };
    let next_withdrawal_ts = match contract.schedule.withdrawal_policy {
        WithdrawalPolicy::Continuous => previous_next,
        WithdrawalPolicy::Windowed { window_intervals } => Some(
            i64::try_from(window_intervals)
                .ok()
                .and_then(|w| w.checked_mul(contract.schedule.interval_seconds()))
                .and_then(|secs| now.checked_add(secs))
                .unwrap_or(i64::MAX),
        ),
    };
    let pending = PendingWithdrawal {
        request_id: request.request_id.clone(),
        amount,
        previous_last_withdrawal_ts: previous.last_withdrawal_ts,
        previous_next_withdrawal_ts: previous_next,
        reserved_at: now,
    };

    // 1. reserve
    store
        .put(&contract_id, counters_patch(&reserved, next_withdrawal_ts, Some(&pending)))
        .await
        .map_err(|e| {
            unavailable(
                "reserve_withdrawal",
                &e,
                json!({ "contract_id": contract_id, "request_id": request.request_id }),
            )
        })?;
    info!(
        contract_id = %contract_id,
        request_id = %request.request_id,
        amount = %amount,
        remaining_to_be_paid = %reserved.remaining_to_be_paid,
        "Withdrawal reserved"
    );

    // 2. credit
    let payout_wallet = contract.schedule.terms().payout_wallet.clone();
    let credited = ledger
        .credit(LedgerEntry {
            user_id: &contract.schedule.user_id,
            wallet_id: &payout_wallet,
            amount,
            request_id: &request.request_id,
            metadata: payout_metadata(&contract),
        })
        .await
        .and_then(|receipt| receipt.into_transaction_id());

    let transaction_id = match credited {
        Ok(transaction_id) => transaction_id,
        Err(credit_error) if credit_error.is_definite_refusal() => {
            return Err(compensate(store, &contract_id, &previous, previous_next, &pending, credit_error).await);
        }
        Err(credit_error) => {
            error!(
                contract_id = %contract_id,
                request_id = %request.request_id,
                wallet_id = %payout_wallet,
                error = %credit_error,
                "Payout credit outcome unknown; reservation left for reconciliation"
            );
            return Err(StakingError::PartialFailure {
                message: "payout credit outcome is unknown; the withdrawal is held for reconciliation".to_string(),
                details: json!({
                    "stage": "credit_unconfirmed",
                    "contract_id": contract_id,
                    "request_id": request.request_id,
                    "amount": super::amount::format_amount(amount),
                    "wallet_id": payout_wallet,
                    "collaborator_error": credit_error.to_string(),
                }),
            });
        }
    };
    info!(
        contract_id = %contract_id,
        request_id = %request.request_id,
        transaction_id = %transaction_id,
        wallet_id = %payout_wallet,
        "Withdrawal credited"
    );

    // 3. commit
    let receipt = WithdrawalReceipt {
        request_id: request.request_id.clone(),
        transaction_id: transaction_id.clone(),
        amount,
        withdrawn_at: now,
    };
    if let Err(e) = store.post(&contract_id, receipt_entry(&receipt)).await {
        error!(
            contract_id = %contract_id,
            request_id = %request.request_id,
            transaction_id = %transaction_id,
            error = %e,
            "Receipt write failed after credit; reservation left for reconciliation"
        );
        return Err(StakingError::PartialFailure {
            message: "payout was credited but the receipt could not be recorded".to_string(),
            details: json!({
                "stage": "record_receipt",
                "contract_id": contract_id,
                "request_id": request.request_id,
                "transaction_id": transaction_id,
                "amount": super::amount::format_amount(amount),
                "collaborator_error": e.to_string(),
            }),
        });
    }
    if let Err(e) = store.put(&contract_id, clear_pending_patch()).await {
        // Receipt exists, so the next locked read treats the reservation as settled.
        warn!(
            contract_id = %contract_id,
            request_id = %request.request_id,
            error = %e,
            "Failed to clear committed reservation"
        );
    }
    info!(
        contract_id = %contract_id,
        request_id = %request.request_id,
        withdrawn_so_far = %reserved.withdrawn_so_far,
        "Withdrawal committed"
    );

    contract.counters = reserved;
    contract.next_withdrawal_ts = next_withdrawal_ts;
    contract.pending = None;
    contract.receipts.insert(receipt.request_id.clone(), receipt.clone());

    Ok(WithdrawalOutcome { contract, receipt })
}

/// Undo a reservation after the ledger refused the credit. Returns the error
/// to surface.
async fn compensate(
    store: &dyn MetadataStore,
    contract_id: &str,
    previous: &PayoutCounters,
    previous_next: Option<i64>,
    pending: &PendingWithdrawal,
    credit_error: CollaboratorError,
) -> StakingError {
    warn!(
        contract_id = %contract_id,
        request_id = %pending.request_id,
        error = %credit_error,
        "Payout credit refused; restoring counters"
    );

    match store
        .put(contract_id, counters_patch(previous, previous_next, None))
        .await
    {
        Ok(()) => {
            info!(contract_id = %contract_id, request_id = %pending.request_id, "Withdrawal compensated");
            match credit_error {
                CollaboratorError::Rejected(message) => StakingError::LedgerDeclined {
                    operation: "credit",
                    message,
                },
                other => unavailable(
                    "credit",
                    &other,
                    json!({
                        "contract_id": contract_id,
                        "request_id": pending.request_id,
                        "counters_restored": true,
                    }),
                ),
            }
        }
        Err(restore_error) => {
            error!(
                contract_id = %contract_id,
                request_id = %pending.request_id,
                credit_error = %credit_error,
                restore_error = %restore_error,
                "Compensation failed; reservation requires reconciliation"
            );
            StakingError::PartialFailure {
                message: "payout credit failed and the reservation could not be released".to_string(),
                details: json!({
                    "stage": "compensate",
                    "contract_id": contract_id,
                    "request_id": pending.request_id,
                    "amount": super::amount::format_amount(pending.amount),
                    "credit_error": credit_error.to_string(),
                    "restore_error": restore_error.to_string(),
                }),
            }
        }
    }
}

/// Settle a reservation whose payout the operator confirmed.
pub async fn reconcile_credited(
    store: &dyn MetadataStore,
    mut contract: StakingContract,
    transaction_id: String,
) -> Result<StakingContract, StakingError> {
    let pending = contract.pending.take().ok_or_else(|| StakingError::NotFound {
        contract_id: contract.contract_id.clone(),
    })?;
    let receipt = WithdrawalReceipt {
        request_id: pending.request_id.clone(),
        transaction_id,
        amount: pending.amount,
        withdrawn_at: pending.reserved_at,
    };

    if !contract.receipts.contains_key(&receipt.request_id) {
        store
            .post(&contract.contract_id, receipt_entry(&receipt))
            .await
            .map_err(|e| StakingError::from_collaborator("record_receipt", e))?;
    }
    store
        .put(&contract.contract_id, clear_pending_patch())
        .await
        .map_err(|e| StakingError::from_collaborator("clear_reservation", e))?;

    info!(
        contract_id = %contract.contract_id,
        request_id = %receipt.request_id,
        transaction_id = %receipt.transaction_id,
        "Reservation reconciled as credited"
    );
    contract.receipts.insert(receipt.request_id.clone(), receipt);
    Ok(contract)
}

/// Release a reservation whose payout never happened.
pub async fn reconcile_not_credited(
    store: &dyn MetadataStore,
    mut contract: StakingContract,
) -> Result<StakingContract, StakingError> {
    let pending = contract.pending.take().ok_or_else(|| StakingError::NotFound {
        contract_id: contract.contract_id.clone(),
    })?;
    let restored = PayoutCounters {
        remaining_to_be_paid: contract.counters.remaining_to_be_paid + pending.amount,
        withdrawn_so_far: (contract.counters.withdrawn_so_far - pending.amount).max(Decimal::ZERO),
        last_withdrawal_ts: pending.previous_last_withdrawal_ts,
    };

    store
        .put(
            &contract.contract_id,
            counters_patch(&restored, pending.previous_next_withdrawal_ts, None),
        )
        .await
        .map_err(|e| StakingError::from_collaborator("release_reservation", e))?;

    info!(
        contract_id = %contract.contract_id,
        request_id = %pending.request_id,
        amount = %pending.amount,
        "Reservation reconciled as not credited"
    );
    contract.counters = restored;
    contract.next_withdrawal_ts = pending.previous_next_withdrawal_ts;
    Ok(contract)
}
