// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Staking service: stake creation, ROI withdrawal, ROI view and operator
//! reconciliation, wired to the collaborators.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::accrual::{accrue, AccrualSnapshot};
use super::amount::format_amount;
use super::authorizer::{authorize, check_caller, check_owner};
use super::cache::ContractCache;
use super::clock::SharedClock;
use super::contract::{clear_pending_patch, ContractDecodeError, ContractState, StakingContract};
use super::error::StakingError;
use super::locks::ContractLocks;
use super::processor::{self, WithdrawalOutcome};
use super::request::{parse_reconcile, parse_stake, parse_withdrawal, ReconcileOutcome};
use super::schedule::validate_plan;
use crate::audit::{AuditEvent, AuditEventType};
use crate::auth::AuthenticatedUser;
use crate::config::StakingConfig;
use crate::providers::{CollaboratorError, Ledger, LedgerEntry, MetadataMap, MetadataStore, RateSource};

/// A freshly created contract.
#[derive(Debug, Clone)]
pub struct StakeCreated {
    pub contract: StakingContract,
    pub debit_transaction_id: String,
}

/// A committed withdrawal with the accrual figures right after it.
#[derive(Debug, Clone)]
pub struct WithdrawalResult {
    pub outcome: WithdrawalOutcome,
    pub snapshot: AccrualSnapshot,
}

/// Display view of a contract at one instant.
#[derive(Debug, Clone)]
pub struct RoiView {
    pub contract: StakingContract,
    pub snapshot: AccrualSnapshot,
    pub state: ContractState,
    pub eligible_at: i64,
}

pub struct StakingService {
    store: Arc<dyn MetadataStore>,
    ledger: Arc<dyn Ledger>,
    rates: Arc<dyn RateSource>,
    cache: ContractCache,
    locks: ContractLocks,
    clock: SharedClock,
    config: StakingConfig,
}

impl StakingService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        ledger: Arc<dyn Ledger>,
        rates: Arc<dyn RateSource>,
        clock: SharedClock,
        config: StakingConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            rates,
            cache: ContractCache::new(config.cache_capacity, config.cache_ttl, clock.clone()),
            locks: ContractLocks::new(),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &StakingConfig {
        &self.config
    }

    fn audit(&self, event_type: AuditEventType) -> AuditEvent {
        AuditEvent::new(event_type, self.clock.now())
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Validate the plan, move the principal into the locked wallet and tag
    /// the locked credit with the schedule.
    pub async fn create_stake(
        &self,
        caller: &AuthenticatedUser,
        body: &Value,
    ) -> Result<StakeCreated, StakingError> {
        let result = self.create_stake_inner(caller, body).await;
        match &result {
            Ok(created) => self
                .audit(AuditEventType::StakeCreated)
                .with_actor(&caller.subject)
                .with_user(&created.contract.schedule.user_id)
                .with_contract(&created.contract.contract_id)
                .with_details(json!({
                    "principal_amount": format_amount(created.contract.schedule.principal_amount),
                    "principal_wallet": created.contract.schedule.principal_wallet,
                    "debit_transaction_id": created.debit_transaction_id,
                }))
                .emit(),
            Err(e) => self
                .audit(rejection_event(e, AuditEventType::StakeRejected))
                .with_actor(&caller.subject)
                .with_details(e.details())
                .failed(e.code())
                .emit(),
        }
        result
    }

    async fn create_stake_inner(
        &self,
        caller: &AuthenticatedUser,
        body: &Value,
    ) -> Result<StakeCreated, StakingError> {
        let request = parse_stake(body)?;
        check_caller(caller, &request.selection.user_id, None)?;
        let request_id = request.request_id;
        let plan = validate_plan(request.selection, &self.config.plan)?;

        let exchange_rate = match plan.rate_pair() {
            None => None,
            Some((from, to)) => Some(self.rates.rate(from, to).await.map_err(|e| match e {
                CollaboratorError::NotFound(_) => StakingError::invalid_plan(
                    "payout_wallet",
                    format!("no exchange rate from `{from}` to `{to}`"),
                ),
                other => StakingError::from_collaborator("exchange_rate", other),
            })?),
        };

        let schedule = plan.build(self.clock.unix_now(), exchange_rate)?;
        let user_id = schedule.user_id.clone();
        let principal = schedule.principal_amount;

        let mut debit_metadata = MetadataMap::new();
        debit_metadata.insert("entry_type".into(), json!("stake_principal"));
        debit_metadata.insert("plan_id".into(), json!(schedule.plan_id));
        let debit_transaction_id = self
            .ledger
            .debit(LedgerEntry {
                user_id: &user_id,
                wallet_id: &schedule.principal_wallet,
                amount: principal,
                request_id: &request_id,
                metadata: debit_metadata,
            })
            .await
            .and_then(|receipt| receipt.into_transaction_id())
            .map_err(|e| StakingError::from_collaborator("debit_principal", e))?;

        let lock_request_id = format!("{request_id}:lock");
        let credited = self
            .ledger
            .credit(LedgerEntry {
                user_id: &user_id,
                wallet_id: &self.config.locked_wallet_id,
                amount: principal,
                request_id: &lock_request_id,
                metadata: StakingContract::initial_metadata(&schedule),
            })
            .await
            .and_then(|receipt| receipt.into_transaction_id());

        let contract_id = match credited {
            Ok(id) => id,
            Err(credit_error) if credit_error.is_definite_refusal() => {
                return Err(self
                    .refund_principal(&schedule, &request_id, &debit_transaction_id, credit_error)
                    .await)
            }
            Err(credit_error) => {
                // The locked credit may have landed; a refund could hand the
                // principal back while the contract lives on.
                error!(
                    request_id = %request_id,
                    debit_transaction_id = %debit_transaction_id,
                    error = %credit_error,
                    "Locked credit outcome unknown after principal debit"
                );
                return Err(StakingError::PartialFailure {
                    message: "principal was debited and the locked credit outcome is unknown".to_string(),
                    details: json!({
                        "stage": "lock_principal_unconfirmed",
                        "request_id": request_id,
                        "lock_request_id": lock_request_id,
                        "debit_transaction_id": debit_transaction_id,
                        "amount": format_amount(principal),
                        "collaborator_error": credit_error.to_string(),
                    }),
                });
            }
        };

        let metadata = StakingContract::initial_metadata(&schedule);
        let contract = StakingContract::from_metadata(&contract_id, &metadata)
            .map_err(|e| decode_error(&contract_id, e))?;

        info!(
            contract_id = %contract_id,
            user_id = %user_id,
            plan_id = %contract.schedule.plan_id,
            principal_amount = %principal,
            total_entitlement = %contract.schedule.terms().total_entitlement,
            end_ts = contract.schedule.end_ts,
            "Stake created"
        );

        Ok(StakeCreated {
            contract,
            debit_transaction_id,
        })
    }

    /// Return the principal after the ledger refused the locked credit.
    async fn refund_principal(
        &self,
        schedule: &super::contract::Schedule,
        request_id: &str,
        debit_transaction_id: &str,
        credit_error: CollaboratorError,
    ) -> StakingError {
        warn!(
            request_id = %request_id,
            debit_transaction_id = %debit_transaction_id,
            error = %credit_error,
            "Locked credit refused after principal debit; refunding"
        );

        let refund_request_id = format!("{request_id}:refund");
        let mut metadata = MetadataMap::new();
        metadata.insert("entry_type".into(), json!("stake_refund"));
        metadata.insert("debit_transaction_id".into(), json!(debit_transaction_id));

        let refunded = self
            .ledger
            .credit(LedgerEntry {
                user_id: &schedule.user_id,
                wallet_id: &schedule.principal_wallet,
                amount: schedule.principal_amount,
                request_id: &refund_request_id,
                metadata,
            })
            .await
            .and_then(|receipt| receipt.into_transaction_id());

        match refunded {
            Ok(refund_transaction_id) => StakingError::CollaboratorUnavailable {
                operation: "lock_principal",
                message: credit_error.to_string(),
                details: json!({
                    "debit_transaction_id": debit_transaction_id,
                    "refund_transaction_id": refund_transaction_id,
                    "contract_created": false,
                }),
            },
            Err(refund_error) => {
                error!(
                    request_id = %request_id,
                    debit_transaction_id = %debit_transaction_id,
                    credit_error = %credit_error,
                    refund_error = %refund_error,
                    "Principal debited but neither locked nor refunded"
                );
                StakingError::PartialFailure {
                    message: "principal was debited but could not be locked or refunded".to_string(),
                    details: json!({
                        "stage": "lock_principal",
                        "request_id": request_id,
                        "debit_transaction_id": debit_transaction_id,
                        "amount": format_amount(schedule.principal_amount),
                        "wallet_id": schedule.principal_wallet,
                        "credit_error": credit_error.to_string(),
                        "refund_error": refund_error.to_string(),
                    }),
                }
            }
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read straight from the store. Used inside the contract lock.
    async fn load(&self, contract_id: &str) -> Result<StakingContract, StakingError> {
        let metadata = self.store.get(contract_id).await.map_err(|e| match e {
            CollaboratorError::NotFound(_) => StakingError::NotFound {
                contract_id: contract_id.to_string(),
            },
            other => StakingError::from_collaborator("load_contract", other),
        })?;
        let contract =
            StakingContract::from_metadata(contract_id, &metadata).map_err(|e| decode_error(contract_id, e))?;

        let total = contract.schedule.terms().total_entitlement;
        if !contract.counters.is_balanced(total) {
            error!(
                contract_id = %contract_id,
                remaining_to_be_paid = %contract.counters.remaining_to_be_paid,
                withdrawn_so_far = %contract.counters.withdrawn_so_far,
                total_entitlement = %total,
                "Contract counters do not add up to total entitlement"
            );
        }
        Ok(contract)
    }

    /// Accrual view for display, served through the cache. Only the owner or
    /// an operator may read it.
    pub async fn roi_view(&self, caller: &AuthenticatedUser, contract_id: &str) -> Result<RoiView, StakingError> {
        let contract = match self.cache.get(contract_id) {
            Some(contract) => contract,
            None => {
                let ticket = self.cache.ticket();
                let contract = self.load(contract_id).await?;
                self.cache.put(contract.clone(), ticket);
                contract
            }
        };

        if let Err(e) = check_caller(caller, &contract.schedule.user_id, Some(contract_id)) {
            self.audit(AuditEventType::PermissionDenied)
                .with_actor(&caller.subject)
                .with_contract(contract_id)
                .with_details(e.details())
                .failed(e.code())
                .emit();
            return Err(e);
        }

        let now = self.clock.unix_now();
        Ok(RoiView {
            snapshot: accrue(&contract, now),
            state: contract.state_at(now),
            eligible_at: contract.eligible_at(),
            contract,
        })
    }

    // =========================================================================
    // Withdrawal
    // =========================================================================

    pub async fn withdraw(
        &self,
        caller: &AuthenticatedUser,
        contract_id: &str,
        body: &Value,
    ) -> Result<WithdrawalResult, StakingError> {
        let result = self.withdraw_inner(caller, contract_id, body).await;
        let event = match &result {
            Ok(done) => self
                .audit(AuditEventType::WithdrawalCommitted)
                .with_request(&done.outcome.receipt.request_id)
                .with_details(json!({
                    "amount": format_amount(done.outcome.receipt.amount),
                    "transaction_id": done.outcome.receipt.transaction_id,
                })),
            Err(e) => self
                .audit(rejection_event(e, AuditEventType::WithdrawalRejected))
                .with_details(e.details())
                .failed(e.code()),
        };
        event.with_actor(&caller.subject).with_contract(contract_id).emit();
        result
    }

    async fn withdraw_inner(
        &self,
        caller: &AuthenticatedUser,
        contract_id: &str,
        body: &Value,
    ) -> Result<WithdrawalResult, StakingError> {
        let request = parse_withdrawal(body)?;
        check_caller(caller, &request.user_id, Some(contract_id))?;

        let _guard = self.locks.lock(contract_id).await;
        let result = self.withdraw_locked(caller, contract_id, request).await;
        self.cache.invalidate(contract_id);
        result
    }

    async fn withdraw_locked(
        &self,
        caller: &AuthenticatedUser,
        contract_id: &str,
        request: super::request::WithdrawalRequest,
    ) -> Result<WithdrawalResult, StakingError> {
        let mut contract = self.load(contract_id).await?;
        check_owner(&contract, &request, caller)?;
        self.settle_committed_reservation(&mut contract).await;

        let now = self.clock.unix_now();
        let authorized = authorize(&contract, request, now)?;
        let outcome = processor::process(self.store.as_ref(), self.ledger.as_ref(), contract, authorized).await?;

        Ok(WithdrawalResult {
            snapshot: accrue(&outcome.contract, now),
            outcome,
        })
    }

    /// A reservation whose request already has a receipt was committed but
    /// never cleared. Drop it so it doesn't block the contract.
    async fn settle_committed_reservation(&self, contract: &mut StakingContract) {
        let committed = contract
            .pending
            .as_ref()
            .is_some_and(|p| contract.receipts.contains_key(&p.request_id));
        if !committed {
            return;
        }
        contract.pending = None;
        if let Err(e) = self.store.put(&contract.contract_id, clear_pending_patch()).await {
            warn!(contract_id = %contract.contract_id, error = %e, "Failed to clear settled reservation");
        }
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Operator settlement of a stuck reservation.
    pub async fn reconcile(
        &self,
        actor: &str,
        contract_id: &str,
        body: &Value,
    ) -> Result<StakingContract, StakingError> {
        let outcome = parse_reconcile(body)?;

        let result = {
            let _guard = self.locks.lock(contract_id).await;
            let result = self.reconcile_locked(contract_id, outcome.clone()).await;
            self.cache.invalidate(contract_id);
            result
        };

        let mut event = self
            .audit(AuditEventType::ReservationReconciled)
            .with_actor(actor)
            .with_contract(contract_id);
        event = match (&result, &outcome) {
            (Ok(_), ReconcileOutcome::Credited { transaction_id }) => {
                event.with_details(json!({ "outcome": "credited", "transaction_id": transaction_id }))
            }
            (Ok(_), ReconcileOutcome::NotCredited) => event.with_details(json!({ "outcome": "not_credited" })),
            (Err(e), _) => event.with_details(e.details()).failed(e.code()),
        };
        event.emit();
        result
    }

    async fn reconcile_locked(
        &self,
        contract_id: &str,
        outcome: ReconcileOutcome,
    ) -> Result<StakingContract, StakingError> {
        let mut contract = self.load(contract_id).await?;
        self.settle_committed_reservation(&mut contract).await;

        match outcome {
            ReconcileOutcome::Credited { transaction_id } => {
                processor::reconcile_credited(self.store.as_ref(), contract, transaction_id).await
            }
            ReconcileOutcome::NotCredited => {
                processor::reconcile_not_credited(self.store.as_ref(), contract).await
            }
        }
    }
}

fn rejection_event(error: &StakingError, otherwise: AuditEventType) -> AuditEventType {
    match error {
        StakingError::Forbidden { .. } => AuditEventType::PermissionDenied,
        _ => otherwise,
    }
}

fn decode_error(contract_id: &str, error: ContractDecodeError) -> StakingError {
    match error {
        ContractDecodeError::NotAContract => StakingError::NotFound {
            contract_id: contract_id.to_string(),
        },
        other => StakingError::CollaboratorUnavailable {
            operation: "load_contract",
            message: other.to_string(),
            details: json!({ "contract_id": contract_id }),
        },
    }
}
