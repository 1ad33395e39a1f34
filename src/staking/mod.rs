// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Staking ROI accrual and withdrawal engine.
//!
//! ## Flow
//!
//! ```text
//! create:   parse -> validate plan -> (rate snapshot) -> debit principal
//!           -> credit locked wallet tagged with the schedule
//! withdraw: parse -> lock contract -> fresh read -> owner -> authorize
//!           -> reserve -> credit payout wallet -> receipt -> release
//! ```
//!
//! All state lives in the ledger's metadata for the locked credit; this crate
//! keeps only a short-lived display cache and per-contract locks.

pub mod accrual;
pub mod amount;
pub mod authorizer;
pub mod cache;
pub mod clock;
pub mod contract;
pub mod error;
pub mod interval;
pub mod locks;
pub mod processor;
pub mod request;
pub mod schedule;
pub mod service;

pub use accrual::AccrualSnapshot;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use contract::{ContractState, StakingContract};
pub use error::StakingError;
pub use interval::IntervalKind;
pub use service::{RoiView, StakeCreated, StakingService, WithdrawalResult};
