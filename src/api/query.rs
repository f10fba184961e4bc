// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization query endpoint, consumed exclusively by the router.
//!
//! The contract is status-code driven so the router never parses a body:
//!
//! - 400 — no resource given
//! - 200 — public resource, or authenticated member of the allow-list
//! - 307 — no session at all; `Location` is the provider authorize URL
//! - 401 — anything else (bad token, expired token, non-member identity)
//!
//! A present-but-invalid cookie deliberately gets 401 rather than a fresh
//! login redirect: a broken or disallowed session should fail loudly, not
//! loop the browser through the provider.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::{debug, info};
use url::Url;

use super::login::{build_authorize_url, ResourceQuery};
use crate::{config::SESSION_COOKIE, state::AuthState};

/// `GET /q/?r=<resource>` — may this request proceed?
pub async fn query(
    State(state): State<AuthState>,
    jar: CookieJar,
    Query(params): Query<ResourceQuery>,
) -> Response {
    let resource = match params.r.as_deref() {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };

    if !is_protected(&resource, &state.config.protected_prefixes) {
        return StatusCode::OK.into_response();
    }

    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        // No session at all: hand back a redirect whose Location the
        // router forwards to the browser.
        let url = build_authorize_url(&state, Some(&resource));
        return Redirect::temporary(url.as_str()).into_response();
    };

    let claims = match state.tokens.verify(cookie.value()) {
        Ok(claims) => claims,
        Err(e) => {
            info!(error = %e, "session cookie rejected");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    if state.config.write_debug {
        debug!(
            sub = %claims.sub,
            organizations = %claims.organizations,
            resource = %resource,
            "authorization query"
        );
    }

    if state.customers.get(&claims.sub).await {
        return StatusCode::OK.into_response();
    }
    for org in claims.organization_list() {
        if state.customers.get(org).await {
            return StatusCode::OK.into_response();
        }
    }

    info!(sub = %claims.sub, "identity not in allow-list");
    StatusCode::UNAUTHORIZED.into_response()
}

/// Whether `resource` falls under a protected prefix. The router sends the
/// full upstream URL; a bare path (as in direct calls) is matched raw.
fn is_protected(resource: &str, prefixes: &[String]) -> bool {
    let path = match Url::parse(resource) {
        Ok(url) => url.path().to_string(),
        Err(_) => resource.to_string(),
    };
    prefixes.iter().any(|prefix| path.starts_with(prefix))
}
