// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Tokens
//!
//! Stateless session handling for the edge gateway.
//!
//! ## Flow
//!
//! 1. `edge-auth` completes the OAuth2 code flow and builds [`SessionClaims`]
//!    from the provider profile.
//! 2. The claims are signed with ES256 and set as an HTTP-only cookie scoped
//!    to the cookie root domain.
//! 3. Every authorization query (`/q/`) verifies the cookie against the
//!    public key and checks expiry; there is no server-side session store.
//!
//! The private key only ever lives in the `edge-auth` process; both keys are
//! read once at startup and are immutable afterwards, so concurrent
//! verification needs no synchronization.

pub mod claims;
pub mod token;

pub use claims::SessionClaims;
pub use token::{TokenError, TokenService};
