// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token payload.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{config::AuthConfig, providers::Profile};

/// Claims carried by the signed session cookie.
///
/// Created exactly once, at the end of a successful OAuth2 callback, and
/// never mutated; the session dies when `exp` passes or the cookie is
/// cleared by logout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    /// Provider login of the user.
    pub sub: String,

    /// Provider-assigned numeric identifier, stringified.
    pub uid: String,

    /// `edge-gateway@<provider>`, e.g. `edge-gateway@github`.
    pub iss: String,

    /// Issued-at, Unix seconds.
    pub iat: i64,

    /// Expiry, Unix seconds; issued-at plus the configured cookie TTL.
    pub exp: i64,

    /// Cookie root domain the token was minted for.
    pub aud: String,

    /// Comma-joined organization logins; empty for providers without an
    /// organization concept.
    #[serde(default)]
    pub organizations: String,

    /// Display name from the provider profile.
    #[serde(default)]
    pub name: String,

    /// Provider access token, embedded so downstream functions can act on
    /// behalf of the user.
    #[serde(default)]
    pub access_token: String,
}

impl SessionClaims {
    pub fn new(
        profile: &Profile,
        organizations: &[String],
        access_token: &str,
        config: &AuthConfig,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: profile.login.clone(),
            uid: profile.id.to_string(),
            iss: format!("edge-gateway@{}", config.provider),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::hours(config.cookie_expiry_hours)).timestamp(),
            aud: config.cookie_root_domain.clone(),
            organizations: organizations.join(","),
            name: profile.name.clone(),
            access_token: access_token.to_string(),
        }
    }

    /// Organization logins as individual entries; skips the empty string
    /// the comma-join produces for org-less providers.
    pub fn organization_list(&self) -> Vec<&str> {
        self.organizations
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}
