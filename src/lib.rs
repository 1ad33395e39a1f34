// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Staking - ROI accrual and withdrawal service
//!
//! Users lock a principal into a staking contract and withdraw the interest it
//! accrues per elapsed interval. Balances and contract state live in an
//! external ledger-of-record; this service computes entitlements, authorizes
//! withdrawals and drives the ledger calls.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Authentication and authorization (Clerk JWT)
//! - `staking` - Accrual math, authorization and the withdrawal saga
//! - `providers` - Ledger, metadata store and exchange-rate collaborators
//! - `audit` - Audit events for money-moving operations

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod staking;
pub mod state;
