// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Staking contract model and its flat metadata encoding.
//!
//! The contract lives entirely in the ledger's metadata for the locked
//! credit that created it. The contract id is that credit's transaction id.
//!
//! ## Metadata layout
//!
//! ```text
//! record_type                    "staking_contract"
//! user_id, plan_id               strings
//! principal_amount               decimal string
//! principal_wallet               wallet id
//! interval_kind                  interval table key
//! interval_count                 number
//! interval_payout_percentage     "N%"
//! payment_pattern                "direct" | "cross_wallet"
//! payout_wallet                  wallet credited on withdrawal
//! exchange_rate                  cross_wallet only, frozen at creation
//! interval_payout_amount         payout currency, decimal string
//! total_entitlement              payout currency, decimal string
//! start_ts, end_ts               unix seconds
//! first_withdrawal_eligible_ts   unix seconds
//! withdrawal_policy              "continuous" | "windowed"
//! withdrawal_window_intervals    windowed only
//! next_withdrawal_ts             windowed only
//! remaining_to_be_paid           decimal string
//! withdrawn_so_far               decimal string
//! last_withdrawal_ts             unix seconds, 0 before first withdrawal
//! pending_roi_withdrawal         reservation object or absent
//! roi_withdrawal_receipt:<id>    { transaction_id, amount, withdrawn_at }
//! ```

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{json, Value};

use super::amount::{format_amount, format_percentage, parse_percentage};
use super::interval::IntervalKind;
use crate::providers::MetadataMap;

pub const RECORD_TYPE: &str = "staking_contract";
pub const RECEIPT_KEY_PREFIX: &str = "roi_withdrawal_receipt:";
pub const PENDING_KEY: &str = "pending_roi_withdrawal";

mod keys {
    pub const RECORD_TYPE: &str = "record_type";
    pub const USER_ID: &str = "user_id";
    pub const PLAN_ID: &str = "plan_id";
    pub const PRINCIPAL_AMOUNT: &str = "principal_amount";
    pub const PRINCIPAL_WALLET: &str = "principal_wallet";
    pub const INTERVAL_KIND: &str = "interval_kind";
    pub const INTERVAL_COUNT: &str = "interval_count";
    pub const INTERVAL_PAYOUT_PERCENTAGE: &str = "interval_payout_percentage";
    pub const PAYMENT_PATTERN: &str = "payment_pattern";
    pub const PAYOUT_WALLET: &str = "payout_wallet";
    pub const EXCHANGE_RATE: &str = "exchange_rate";
    pub const INTERVAL_PAYOUT_AMOUNT: &str = "interval_payout_amount";
    pub const TOTAL_ENTITLEMENT: &str = "total_entitlement";
    pub const START_TS: &str = "start_ts";
    pub const END_TS: &str = "end_ts";
    pub const FIRST_WITHDRAWAL_ELIGIBLE_TS: &str = "first_withdrawal_eligible_ts";
    pub const WITHDRAWAL_POLICY: &str = "withdrawal_policy";
    pub const WITHDRAWAL_WINDOW_INTERVALS: &str = "withdrawal_window_intervals";
    pub const NEXT_WITHDRAWAL_TS: &str = "next_withdrawal_ts";
    pub const REMAINING_TO_BE_PAID: &str = "remaining_to_be_paid";
    pub const WITHDRAWN_SO_FAR: &str = "withdrawn_so_far";
    pub const LAST_WITHDRAWAL_TS: &str = "last_withdrawal_ts";
}

/// Failure to read a contract out of metadata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractDecodeError {
    /// The metadata belongs to some other kind of transaction.
    #[error("metadata is not a staking contract")]
    NotAContract,
    #[error("metadata field `{0}` is missing")]
    Missing(&'static str),
    #[error("metadata field `{0}` is malformed")]
    Malformed(&'static str),
}

/// How the contract gates withdrawals. Captured at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalPolicy {
    /// Any time after first eligibility, capped by accrual.
    Continuous,
    /// Only at or after `next_withdrawal_ts`, which moves forward by
    /// `window_intervals` intervals after each withdrawal.
    Windowed { window_intervals: u64 },
}

impl WithdrawalPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalPolicy::Continuous => "continuous",
            WithdrawalPolicy::Windowed { .. } => "windowed",
        }
    }
}

/// Where and how much interest is paid, in the payout currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutTerms {
    pub payout_wallet: String,
    pub interval_payout_amount: Decimal,
    pub total_entitlement: Decimal,
}

/// Payment pattern, selected once at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentPattern {
    /// Interest paid in the principal's wallet family.
    Direct(PayoutTerms),
    /// Interest paid in a second currency at a rate frozen at creation.
    CrossWallet {
        terms: PayoutTerms,
        exchange_rate: Decimal,
    },
}

impl PaymentPattern {
    pub fn terms(&self) -> &PayoutTerms {
        match self {
            PaymentPattern::Direct(terms) | PaymentPattern::CrossWallet { terms, .. } => terms,
        }
    }

    pub fn exchange_rate(&self) -> Option<Decimal> {
        match self {
            PaymentPattern::Direct(_) => None,
            PaymentPattern::CrossWallet { exchange_rate, .. } => Some(*exchange_rate),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPattern::Direct(_) => "direct",
            PaymentPattern::CrossWallet { .. } => "cross_wallet",
        }
    }
}

/// Immutable schedule parameters fixed at stake creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub user_id: String,
    pub plan_id: String,
    pub principal_amount: Decimal,
    pub principal_wallet: String,
    pub interval_kind: IntervalKind,
    pub interval_count: u64,
    /// Fraction, e.g. `0.01` for `"1%"`.
    pub interval_payout_percentage: Decimal,
    pub start_ts: i64,
    pub end_ts: i64,
    pub first_withdrawal_eligible_ts: i64,
    pub withdrawal_policy: WithdrawalPolicy,
    pub payment: PaymentPattern,
}

impl Schedule {
    pub fn interval_seconds(&self) -> i64 {
        self.interval_kind.seconds()
    }

    /// Per-interval payout in the principal currency.
    pub fn principal_interval_payout(&self) -> Decimal {
        super::amount::quantize(self.principal_amount * self.interval_payout_percentage)
    }

    /// Whole-contract payout in the principal currency.
    pub fn principal_total_entitlement(&self) -> Decimal {
        self.principal_interval_payout() * Decimal::from(self.interval_count)
    }

    pub fn terms(&self) -> &PayoutTerms {
        self.payment.terms()
    }
}

/// Running counters, in the payout currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutCounters {
    pub remaining_to_be_paid: Decimal,
    pub withdrawn_so_far: Decimal,
    /// 0 until the first withdrawal.
    pub last_withdrawal_ts: i64,
}

impl PayoutCounters {
    pub fn fresh(total_entitlement: Decimal) -> Self {
        Self {
            remaining_to_be_paid: total_entitlement,
            withdrawn_so_far: Decimal::ZERO,
            last_withdrawal_ts: 0,
        }
    }

    /// `remaining + withdrawn == total`.
    pub fn is_balanced(&self, total_entitlement: Decimal) -> bool {
        self.remaining_to_be_paid + self.withdrawn_so_far == total_entitlement
    }
}

/// Reservation written before the ledger credit, cleared after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWithdrawal {
    pub request_id: String,
    pub amount: Decimal,
    pub previous_last_withdrawal_ts: i64,
    pub previous_next_withdrawal_ts: Option<i64>,
    pub reserved_at: i64,
}

/// Record of a paid-out withdrawal, keyed by request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalReceipt {
    pub request_id: String,
    pub transaction_id: String,
    pub amount: Decimal,
    pub withdrawn_at: i64,
}

/// Contract lifecycle stage, derived on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContractState {
    Active,
    Matured,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakingContract {
    pub contract_id: String,
    pub schedule: Schedule,
    pub counters: PayoutCounters,
    /// Windowed policy only.
    pub next_withdrawal_ts: Option<i64>,
    pub pending: Option<PendingWithdrawal>,
    pub receipts: HashMap<String, WithdrawalReceipt>,
}

impl StakingContract {
    pub fn state_at(&self, now: i64) -> ContractState {
        if self.counters.remaining_to_be_paid <= Decimal::ZERO {
            ContractState::Exhausted
        } else if now >= self.schedule.end_ts {
            ContractState::Matured
        } else {
            ContractState::Active
        }
    }

    /// Earliest time the next withdrawal may be requested.
    pub fn eligible_at(&self) -> i64 {
        match self.schedule.withdrawal_policy {
            WithdrawalPolicy::Continuous => self.schedule.first_withdrawal_eligible_ts,
            WithdrawalPolicy::Windowed { .. } => self
                .next_withdrawal_ts
                .unwrap_or(self.schedule.first_withdrawal_eligible_ts),
        }
    }

    /// Metadata attached to the locked credit when the contract is created.
    pub fn initial_metadata(schedule: &Schedule) -> MetadataMap {
        let mut map = encode_schedule(schedule);
        let counters = PayoutCounters::fresh(schedule.terms().total_entitlement);
        let next = match schedule.withdrawal_policy {
            WithdrawalPolicy::Continuous => None,
            WithdrawalPolicy::Windowed { .. } => Some(schedule.first_withdrawal_eligible_ts),
        };
        map.extend(counters_patch(&counters, next, None));
        map
    }

    pub fn from_metadata(
        contract_id: impl Into<String>,
        metadata: &MetadataMap,
    ) -> Result<Self, ContractDecodeError> {
        if metadata.get(keys::RECORD_TYPE).and_then(Value::as_str) != Some(RECORD_TYPE) {
            return Err(ContractDecodeError::NotAContract);
        }

        let schedule = decode_schedule(metadata)?;
        let counters = PayoutCounters {
            remaining_to_be_paid: decimal(metadata, keys::REMAINING_TO_BE_PAID)?,
            withdrawn_so_far: decimal(metadata, keys::WITHDRAWN_SO_FAR)?,
            last_withdrawal_ts: optional_i64(metadata, keys::LAST_WITHDRAWAL_TS)?.unwrap_or(0),
        };
        let next_withdrawal_ts = optional_i64(metadata, keys::NEXT_WITHDRAWAL_TS)?;
        let pending = match metadata.get(PENDING_KEY) {
            None | Some(Value::Null) => None,
            Some(value) => Some(decode_pending(value)?),
        };

        let mut receipts = HashMap::new();
        for (key, value) in metadata {
            if let Some(request_id) = key.strip_prefix(RECEIPT_KEY_PREFIX) {
                receipts.insert(request_id.to_string(), decode_receipt(request_id, value)?);
            }
        }

        Ok(Self {
            contract_id: contract_id.into(),
            schedule,
            counters,
            next_withdrawal_ts,
            pending,
            receipts,
        })
    }
}

/// Patch writing the mutable counters and the reservation slot.
pub fn counters_patch(
    counters: &PayoutCounters,
    next_withdrawal_ts: Option<i64>,
    pending: Option<&PendingWithdrawal>,
) -> MetadataMap {
    let mut map = MetadataMap::new();
    map.insert(
        keys::REMAINING_TO_BE_PAID.into(),
        json!(format_amount(counters.remaining_to_be_paid)),
    );
    map.insert(
        keys::WITHDRAWN_SO_FAR.into(),
        json!(format_amount(counters.withdrawn_so_far)),
    );
    map.insert(keys::LAST_WITHDRAWAL_TS.into(), json!(counters.last_withdrawal_ts));
    if let Some(next) = next_withdrawal_ts {
        map.insert(keys::NEXT_WITHDRAWAL_TS.into(), json!(next));
    }
    map.insert(
        PENDING_KEY.into(),
        pending.map(encode_pending).unwrap_or(Value::Null),
    );
    map
}

/// Patch clearing the reservation slot only.
pub fn clear_pending_patch() -> MetadataMap {
    let mut map = MetadataMap::new();
    map.insert(PENDING_KEY.into(), Value::Null);
    map
}

/// Additive entry recording a paid withdrawal.
pub fn receipt_entry(receipt: &WithdrawalReceipt) -> MetadataMap {
    let mut map = MetadataMap::new();
    map.insert(
        format!("{RECEIPT_KEY_PREFIX}{}", receipt.request_id),
        json!({
            "transaction_id": receipt.transaction_id,
            "amount": format_amount(receipt.amount),
            "withdrawn_at": receipt.withdrawn_at,
        }),
    );
    map
}

fn encode_schedule(schedule: &Schedule) -> MetadataMap {
    let terms = schedule.terms();
    let mut map = MetadataMap::new();
    map.insert(keys::RECORD_TYPE.into(), json!(RECORD_TYPE));
    map.insert(keys::USER_ID.into(), json!(schedule.user_id));
    map.insert(keys::PLAN_ID.into(), json!(schedule.plan_id));
    map.insert(
        keys::PRINCIPAL_AMOUNT.into(),
        json!(format_amount(schedule.principal_amount)),
    );
    map.insert(keys::PRINCIPAL_WALLET.into(), json!(schedule.principal_wallet));
    map.insert(keys::INTERVAL_KIND.into(), json!(schedule.interval_kind.as_str()));
    map.insert(keys::INTERVAL_COUNT.into(), json!(schedule.interval_count));
    map.insert(
        keys::INTERVAL_PAYOUT_PERCENTAGE.into(),
        json!(format_percentage(schedule.interval_payout_percentage)),
    );
    map.insert(keys::PAYMENT_PATTERN.into(), json!(schedule.payment.as_str()));
    map.insert(keys::PAYOUT_WALLET.into(), json!(terms.payout_wallet));
    if let Some(rate) = schedule.payment.exchange_rate() {
        map.insert(keys::EXCHANGE_RATE.into(), json!(format_amount(rate)));
    }
    map.insert(
        keys::INTERVAL_PAYOUT_AMOUNT.into(),
        json!(format_amount(terms.interval_payout_amount)),
    );
    map.insert(
        keys::TOTAL_ENTITLEMENT.into(),
        json!(format_amount(terms.total_entitlement)),
    );
    map.insert(keys::START_TS.into(), json!(schedule.start_ts));
    map.insert(keys::END_TS.into(), json!(schedule.end_ts));
    map.insert(
        keys::FIRST_WITHDRAWAL_ELIGIBLE_TS.into(),
        json!(schedule.first_withdrawal_eligible_ts),
    );
    map.insert(
        keys::WITHDRAWAL_POLICY.into(),
        json!(schedule.withdrawal_policy.as_str()),
    );
    if let WithdrawalPolicy::Windowed { window_intervals } = schedule.withdrawal_policy {
        map.insert(keys::WITHDRAWAL_WINDOW_INTERVALS.into(), json!(window_intervals));
    }
    map
}

fn decode_schedule(metadata: &MetadataMap) -> Result<Schedule, ContractDecodeError> {
    let interval_kind = IntervalKind::parse(string(metadata, keys::INTERVAL_KIND)?)
        .ok_or(ContractDecodeError::Malformed(keys::INTERVAL_KIND))?;
    let interval_payout_percentage = parse_percentage(string(metadata, keys::INTERVAL_PAYOUT_PERCENTAGE)?)
        .map_err(|_| ContractDecodeError::Malformed(keys::INTERVAL_PAYOUT_PERCENTAGE))?;

    let terms = PayoutTerms {
        payout_wallet: string(metadata, keys::PAYOUT_WALLET)?.to_string(),
        interval_payout_amount: decimal(metadata, keys::INTERVAL_PAYOUT_AMOUNT)?,
        total_entitlement: decimal(metadata, keys::TOTAL_ENTITLEMENT)?,
    };
    let payment = match string(metadata, keys::PAYMENT_PATTERN)? {
        "direct" => PaymentPattern::Direct(terms),
        "cross_wallet" => PaymentPattern::CrossWallet {
            terms,
            exchange_rate: decimal(metadata, keys::EXCHANGE_RATE)?,
        },
        _ => return Err(ContractDecodeError::Malformed(keys::PAYMENT_PATTERN)),
    };

    let withdrawal_policy = match metadata.get(keys::WITHDRAWAL_POLICY).and_then(Value::as_str) {
        None | Some("continuous") => WithdrawalPolicy::Continuous,
        Some("windowed") => WithdrawalPolicy::Windowed {
            window_intervals: u64_field(metadata, keys::WITHDRAWAL_WINDOW_INTERVALS)?,
        },
        Some(_) => return Err(ContractDecodeError::Malformed(keys::WITHDRAWAL_POLICY)),
    };

    Ok(Schedule {
        user_id: string(metadata, keys::USER_ID)?.to_string(),
        plan_id: string(metadata, keys::PLAN_ID)?.to_string(),
        principal_amount: decimal(metadata, keys::PRINCIPAL_AMOUNT)?,
        principal_wallet: string(metadata, keys::PRINCIPAL_WALLET)?.to_string(),
        interval_kind,
        interval_count: u64_field(metadata, keys::INTERVAL_COUNT)?,
        interval_payout_percentage,
        start_ts: i64_field(metadata, keys::START_TS)?,
        end_ts: i64_field(metadata, keys::END_TS)?,
        first_withdrawal_eligible_ts: i64_field(metadata, keys::FIRST_WITHDRAWAL_ELIGIBLE_TS)?,
        withdrawal_policy,
        payment,
    })
}

fn encode_pending(pending: &PendingWithdrawal) -> Value {
    json!({
        "request_id": pending.request_id,
        "amount": format_amount(pending.amount),
        "previous_last_withdrawal_ts": pending.previous_last_withdrawal_ts,
        "previous_next_withdrawal_ts": pending.previous_next_withdrawal_ts,
        "reserved_at": pending.reserved_at,
    })
}

fn decode_pending(value: &Value) -> Result<PendingWithdrawal, ContractDecodeError> {
    let map = value
        .as_object()
        .ok_or(ContractDecodeError::Malformed(PENDING_KEY))?;
    Ok(PendingWithdrawal {
        request_id: string(map, "request_id")?.to_string(),
        amount: decimal(map, "amount")?,
        previous_last_withdrawal_ts: i64_field(map, "previous_last_withdrawal_ts")?,
        previous_next_withdrawal_ts: optional_i64(map, "previous_next_withdrawal_ts")?,
        reserved_at: i64_field(map, "reserved_at")?,
    })
}

fn decode_receipt(request_id: &str, value: &Value) -> Result<WithdrawalReceipt, ContractDecodeError> {
    let map = value
        .as_object()
        .ok_or(ContractDecodeError::Malformed(RECEIPT_KEY_PREFIX))?;
    Ok(WithdrawalReceipt {
        request_id: request_id.to_string(),
        transaction_id: string(map, "transaction_id")?.to_string(),
        amount: decimal(map, "amount")?,
        withdrawn_at: i64_field(map, "withdrawn_at")?,
    })
}

fn string<'a>(map: &'a MetadataMap, key: &'static str) -> Result<&'a str, ContractDecodeError> {
    match map.get(key) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(ContractDecodeError::Malformed(key)),
        None => Err(ContractDecodeError::Missing(key)),
    }
}

fn decimal(map: &MetadataMap, key: &'static str) -> Result<Decimal, ContractDecodeError> {
    match map.get(key) {
        Some(Value::String(s)) => {
            Decimal::from_str(s.trim()).map_err(|_| ContractDecodeError::Malformed(key))
        }
        Some(Value::Number(n)) => {
            Decimal::from_str(&n.to_string()).map_err(|_| ContractDecodeError::Malformed(key))
        }
        Some(_) => Err(ContractDecodeError::Malformed(key)),
        None => Err(ContractDecodeError::Missing(key)),
    }
}

/// Timestamps may come back as numbers or numeric strings.
fn optional_i64(map: &MetadataMap, key: &'static str) -> Result<Option<i64>, ContractDecodeError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or(ContractDecodeError::Malformed(key)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ContractDecodeError::Malformed(key)),
        Some(_) => Err(ContractDecodeError::Malformed(key)),
    }
}

fn i64_field(map: &MetadataMap, key: &'static str) -> Result<i64, ContractDecodeError> {
    optional_i64(map, key)?.ok_or(ContractDecodeError::Missing(key))
}

fn u64_field(map: &MetadataMap, key: &'static str) -> Result<u64, ContractDecodeError> {
    let value = i64_field(map, key)?;
    u64::try_from(value).map_err(|_| ContractDecodeError::Malformed(key))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    /// 100 principal, 1% per minute, 5 minutes, starting at `start_ts`.
    pub(crate) fn sample_schedule(start_ts: i64) -> Schedule {
        Schedule {
            user_id: "42".to_string(),
            plan_id: "starter".to_string(),
            principal_amount: d("100"),
            principal_wallet: "usdt".to_string(),
            interval_kind: IntervalKind::EveryMinute,
            interval_count: 5,
            interval_payout_percentage: d("0.01"),
            start_ts,
            end_ts: start_ts + 300,
            first_withdrawal_eligible_ts: start_ts + 60,
            withdrawal_policy: WithdrawalPolicy::Continuous,
            payment: PaymentPattern::Direct(PayoutTerms {
                payout_wallet: "usdt".to_string(),
                interval_payout_amount: d("1"),
                total_entitlement: d("5"),
            }),
        }
    }

    pub(crate) fn sample_contract(start_ts: i64) -> StakingContract {
        let metadata = StakingContract::initial_metadata(&sample_schedule(start_ts));
        StakingContract::from_metadata("contract-1", &metadata).unwrap()
    }

    #[test]
    fn initial_metadata_decodes_to_fresh_contract() {
        let contract = sample_contract(1_000);
        assert_eq!(contract.contract_id, "contract-1");
        assert_eq!(contract.schedule, sample_schedule(1_000));
        assert_eq!(contract.counters, PayoutCounters::fresh(d("5")));
        assert!(contract.pending.is_none());
        assert!(contract.receipts.is_empty());
        assert!(contract.counters.is_balanced(d("5")));
    }

    #[test]
    fn cross_wallet_keeps_frozen_rate() {
        let mut schedule = sample_schedule(0);
        schedule.payment = PaymentPattern::CrossWallet {
            terms: PayoutTerms {
                payout_wallet: "ngn".to_string(),
                interval_payout_amount: d("1500"),
                total_entitlement: d("7500"),
            },
            exchange_rate: d("1500"),
        };
        let metadata = StakingContract::initial_metadata(&schedule);
        assert_eq!(metadata["exchange_rate"], "1500");
        assert_eq!(metadata["payment_pattern"], "cross_wallet");

        let contract = StakingContract::from_metadata("c", &metadata).unwrap();
        assert_eq!(contract.schedule.payment.exchange_rate(), Some(d("1500")));
        assert_eq!(contract.schedule.terms().payout_wallet, "ngn");
        assert_eq!(contract.counters.remaining_to_be_paid, d("7500"));
    }

    #[test]
    fn windowed_policy_seeds_next_withdrawal() {
        let mut schedule = sample_schedule(0);
        schedule.withdrawal_policy = WithdrawalPolicy::Windowed { window_intervals: 2 };
        let contract =
            StakingContract::from_metadata("c", &StakingContract::initial_metadata(&schedule)).unwrap();
        assert_eq!(contract.next_withdrawal_ts, Some(60));
        assert_eq!(contract.eligible_at(), 60);
        assert_eq!(
            contract.schedule.withdrawal_policy,
            WithdrawalPolicy::Windowed { window_intervals: 2 }
        );
    }

    #[test]
    fn receipts_and_pending_are_decoded() {
        let mut metadata = StakingContract::initial_metadata(&sample_schedule(0));
        let pending = PendingWithdrawal {
            request_id: "r2".to_string(),
            amount: d("1"),
            previous_last_withdrawal_ts: 180,
            previous_next_withdrawal_ts: None,
            reserved_at: 240,
        };
        metadata.extend(counters_patch(
            &PayoutCounters {
                remaining_to_be_paid: d("1"),
                withdrawn_so_far: d("4"),
                last_withdrawal_ts: 240,
            },
            None,
            Some(&pending),
        ));
        metadata.extend(receipt_entry(&WithdrawalReceipt {
            request_id: "r1".to_string(),
            transaction_id: "tx-1".to_string(),
            amount: d("3"),
            withdrawn_at: 180,
        }));

        let contract = StakingContract::from_metadata("c", &metadata).unwrap();
        assert_eq!(contract.pending, Some(pending));
        assert_eq!(contract.receipts["r1"].transaction_id, "tx-1");
        assert_eq!(contract.counters.last_withdrawal_ts, 240);
    }

    #[test]
    fn foreign_metadata_is_not_a_contract() {
        let mut metadata = MetadataMap::new();
        metadata.insert("note".into(), json!("top-up"));
        assert_eq!(
            StakingContract::from_metadata("c", &metadata),
            Err(ContractDecodeError::NotAContract)
        );
    }

    #[test]
    fn string_timestamps_are_accepted() {
        let mut metadata = StakingContract::initial_metadata(&sample_schedule(0));
        metadata.insert("last_withdrawal_ts".into(), json!("120"));
        let contract = StakingContract::from_metadata("c", &metadata).unwrap();
        assert_eq!(contract.counters.last_withdrawal_ts, 120);
    }

    #[test]
    fn missing_counter_is_reported() {
        let mut metadata = StakingContract::initial_metadata(&sample_schedule(0));
        metadata.remove("withdrawn_so_far");
        assert_eq!(
            StakingContract::from_metadata("c", &metadata),
            Err(ContractDecodeError::Missing("withdrawn_so_far"))
        );
    }

    #[test]
    fn derived_state_follows_counters_and_time() {
        let mut contract = sample_contract(0);
        assert_eq!(contract.state_at(10), ContractState::Active);
        assert_eq!(contract.state_at(300), ContractState::Matured);
        contract.counters.remaining_to_be_paid = Decimal::ZERO;
        assert_eq!(contract.state_at(10), ContractState::Exhausted);
    }
}
