// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Clerk bearer tokens guard every staking endpoint.
//!
//! ## Auth Flow
//!
//! 1. The client authenticates with Clerk
//! 2. Requests carry `Authorization: Bearer <Clerk JWT>`
//! 3. This server:
//!    - fetches the Clerk JWKS over HTTPS
//!    - verifies signature, expiry, issuer and audience
//!    - reads `sub` (the actor for audit events) and the role from public metadata
//!
//! Contract ownership is not decided here. The withdrawal body names the
//! owner and the staking service checks it against the contract.
//!
//! ## Security
//!
//! - JWKS is cached with a TTL, stale keys serve while the endpoint is down
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod roles;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::{Auth, OperatorOnly};
pub use jwks::JwksManager;
pub use roles::Role;
