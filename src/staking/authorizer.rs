// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Withdrawal authorizer.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. bearer credential (the `Auth` extractor, before this module is reached)
//! 2. body shape ([`super::request::parse_withdrawal`]), then contract ownership
//!    and the caller's right to act for the owner
//! 3. eligibility time
//! 4. idempotency: receipt or in-flight reservation for the same request id
//! 5. amount against `withdrawable_now`
//! 6. amount against `remaining_to_be_paid`
//!
//! Must be called with a freshly read contract while holding the contract lock.

use super::accrual::{accrue, AccrualSnapshot};
use super::contract::StakingContract;
use super::error::StakingError;
use super::request::WithdrawalRequest;
use crate::auth::AuthenticatedUser;

/// A withdrawal that passed every check.
#[derive(Debug, Clone)]
pub struct AuthorizedWithdrawal {
    pub request: WithdrawalRequest,
    pub snapshot: AccrualSnapshot,
    pub now: i64,
}

/// The caller's token must cover `user_id`. Clients act only as the ledger
/// user their token names; operators and admins act for anyone.
pub fn check_caller(
    caller: &AuthenticatedUser,
    user_id: &str,
    contract_id: Option<&str>,
) -> Result<(), StakingError> {
    if caller.may_act_for(user_id) {
        return Ok(());
    }
    Err(StakingError::Forbidden {
        contract_id: contract_id.map(str::to_string),
        user_id: user_id.to_string(),
    })
}

/// Step 2 tail: the body's user must own the contract and the caller must be
/// allowed to act for that user.
pub fn check_owner(
    contract: &StakingContract,
    request: &WithdrawalRequest,
    caller: &AuthenticatedUser,
) -> Result<(), StakingError> {
    if contract.schedule.user_id != request.user_id {
        return Err(StakingError::Forbidden {
            contract_id: Some(contract.contract_id.clone()),
            user_id: request.user_id.clone(),
        });
    }
    check_caller(caller, &contract.schedule.user_id, Some(&contract.contract_id))
}

/// Steps 3 to 6.
pub fn authorize(
    contract: &StakingContract,
    request: WithdrawalRequest,
    now: i64,
) -> Result<AuthorizedWithdrawal, StakingError> {
    let eligible_at = contract.eligible_at();
    if now < eligible_at {
        return Err(StakingError::NotYetEligible { now, eligible_at });
    }

    if let Some(receipt) = contract.receipts.get(&request.request_id) {
        return Err(StakingError::DuplicateRequest {
            request_id: request.request_id,
            transaction_id: Some(receipt.transaction_id.clone()),
        });
    }
    if let Some(pending) = &contract.pending {
        if pending.request_id == request.request_id {
            return Err(StakingError::DuplicateRequest {
                request_id: request.request_id,
                transaction_id: None,
            });
        }
        return Err(StakingError::ReconciliationRequired {
            contract_id: contract.contract_id.clone(),
            pending_request_id: pending.request_id.clone(),
        });
    }

    let snapshot = accrue(contract, now);
    if request.amount > snapshot.withdrawable_now {
        return Err(StakingError::ExceedsAccrued {
            requested: request.amount,
            withdrawable_now: snapshot.withdrawable_now,
        });
    }

    let remaining = contract.counters.remaining_to_be_paid;
    if request.amount > remaining {
        return Err(StakingError::ExceedsContractRemainder {
            requested: request.amount,
            remaining_to_be_paid: remaining,
        });
    }

    Ok(AuthorizedWithdrawal {
        request,
        snapshot,
        now,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::staking::contract::tests::{d, sample_contract};
    use crate::staking::contract::{PendingWithdrawal, WithdrawalPolicy, WithdrawalReceipt};
    use rust_decimal::Decimal;

    const T0: i64 = 1_700_000_000;

    fn request(request_id: &str, amount: &str) -> WithdrawalRequest {
        WithdrawalRequest {
            request_id: request_id.to_string(),
            user_id: "42".to_string(),
            amount: d(amount),
        }
    }

    #[test]
    fn eligibility_boundary() {
        let contract = sample_contract(T0);
        let eligible = contract.schedule.first_withdrawal_eligible_ts;

        let err = authorize(&contract, request("r1", "1"), eligible - 1).unwrap_err();
        assert_eq!(
            err,
            StakingError::NotYetEligible {
                now: eligible - 1,
                eligible_at: eligible
            }
        );

        let ok = authorize(&contract, request("r1", "1"), eligible).unwrap();
        assert_eq!(ok.snapshot.withdrawable_now, d("1"));
    }

    #[test]
    fn remainder_cap_applies_below_accrued() {
        let mut contract = sample_contract(T0);
        contract.schedule.payment = crate::staking::contract::PaymentPattern::Direct(
            crate::staking::contract::PayoutTerms {
                payout_wallet: "usdt".to_string(),
                interval_payout_amount: d("5"),
                total_entitlement: d("25"),
            },
        );
        contract.counters.remaining_to_be_paid = d("8");
        contract.counters.withdrawn_so_far = d("17");

        // four intervals at 5 each: withdrawable 20
        let err = authorize(&contract, request("r1", "10"), T0 + 240).unwrap_err();
        assert_eq!(
            err,
            StakingError::ExceedsContractRemainder {
                requested: d("10"),
                remaining_to_be_paid: d("8"),
            }
        );
    }

    #[test]
    fn exceeding_accrual_reports_cap() {
        let contract = sample_contract(T0);
        let err = authorize(&contract, request("r1", "2.5"), T0 + 150).unwrap_err();
        assert_eq!(
            err,
            StakingError::ExceedsAccrued {
                requested: d("2.5"),
                withdrawable_now: d("2"),
            }
        );
    }

    #[test]
    fn receipt_makes_replay_a_duplicate() {
        let mut contract = sample_contract(T0);
        contract.receipts.insert(
            "r1".to_string(),
            WithdrawalReceipt {
                request_id: "r1".to_string(),
                transaction_id: "tx-1".to_string(),
                amount: d("1"),
                withdrawn_at: T0 + 60,
            },
        );
        let err = authorize(&contract, request("r1", "1"), T0 + 120).unwrap_err();
        assert_eq!(
            err,
            StakingError::DuplicateRequest {
                request_id: "r1".to_string(),
                transaction_id: Some("tx-1".to_string()),
            }
        );
    }

    #[test]
    fn reservation_blocks_other_requests() {
        let mut contract = sample_contract(T0);
        contract.pending = Some(PendingWithdrawal {
            request_id: "r1".to_string(),
            amount: d("1"),
            previous_last_withdrawal_ts: 0,
            previous_next_withdrawal_ts: None,
            reserved_at: T0 + 60,
        });

        assert!(matches!(
            authorize(&contract, request("r1", "1"), T0 + 120),
            Err(StakingError::DuplicateRequest { transaction_id: None, .. })
        ));
        assert!(matches!(
            authorize(&contract, request("r2", "1"), T0 + 120),
            Err(StakingError::ReconciliationRequired { ref pending_request_id, .. })
                if pending_request_id == "r1"
        ));
    }

    #[test]
    fn windowed_contract_gates_on_next_window() {
        let mut contract = sample_contract(T0);
        contract.schedule.withdrawal_policy = WithdrawalPolicy::Windowed { window_intervals: 2 };
        contract.next_withdrawal_ts = Some(T0 + 240);

        assert!(matches!(
            authorize(&contract, request("r1", "1"), T0 + 180),
            Err(StakingError::NotYetEligible { eligible_at, .. }) if eligible_at == T0 + 240
        ));
        assert!(authorize(&contract, request("r1", "1"), T0 + 240).is_ok());
    }

    pub(crate) fn caller(user_id: Option<&str>, role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            subject: "user_test".to_string(),
            role,
            user_id: user_id.map(str::to_string),
            session_id: None,
            expires_at: i64::MAX,
        }
    }

    #[test]
    fn owner_mismatch_is_forbidden() {
        let contract = sample_contract(T0);
        let owner = caller(Some("42"), Role::Client);
        let mut req = request("r1", "1");
        req.user_id = "7".to_string();
        assert!(matches!(
            check_owner(&contract, &req, &owner),
            Err(StakingError::Forbidden { .. })
        ));
        assert!(check_owner(&contract, &request("r1", "1"), &owner).is_ok());
    }

    #[test]
    fn body_user_id_does_not_stand_in_for_the_token() {
        let contract = sample_contract(T0);
        let stranger = caller(Some("7"), Role::Client);
        let err = check_owner(&contract, &request("r1", "1"), &stranger).unwrap_err();
        assert_eq!(
            err,
            StakingError::Forbidden {
                contract_id: Some(contract.contract_id.clone()),
                user_id: "42".to_string(),
            }
        );

        let anonymous = caller(None, Role::Client);
        assert!(check_owner(&contract, &request("r1", "1"), &anonymous).is_err());

        let operator = caller(None, Role::Operator);
        assert!(check_owner(&contract, &request("r1", "1"), &operator).is_ok());
        assert!(check_caller(&caller(None, Role::Admin), "42", None).is_ok());
    }

    #[test]
    fn exhausted_contract_rejects_further_withdrawals() {
        let mut contract = sample_contract(T0);
        contract.counters.remaining_to_be_paid = Decimal::ZERO;
        contract.counters.withdrawn_so_far = d("5");
        assert!(authorize(&contract, request("r9", "1"), T0 + 300).is_err());
    }
}
