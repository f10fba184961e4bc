// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Auth Service HTTP Surface
//!
//! Routes exposed by `edge-auth`:
//!
//! - `/login/` — static login page, `/login/{provider}` — authorize redirect
//! - `/oauth2/authorized` — OAuth2 callback, sets the session cookie
//! - `/q/` — authorization query consumed by the router
//! - `/logout/`, `/` — session management pages
//! - `/healthz/` — liveness

use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;

use crate::{config::AuthConfig, config::SESSION_COOKIE, state::AuthState};

pub mod callback;
pub mod login;
pub mod pages;
pub mod query;
pub mod session;

pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/", get(session::homepage))
        .route("/login/", get(login::login_page).post(login::login_page))
        .route("/login/{provider}", get(login::authorize_redirect))
        .route("/oauth2/authorized", get(callback::oauth2_authorized))
        .route("/q/", get(query::query))
        .route("/logout/", get(session::logout))
        .route("/healthz/", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "OK"
}

/// `Set-Cookie` value for a freshly signed session token. HTTP-only, scoped
/// to the cookie root domain so every subdomain of the platform sends it.
pub(crate) fn session_cookie_header(
    token: &str,
    config: &AuthConfig,
    expires: DateTime<Utc>,
) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; Domain={}; Expires={}; HttpOnly",
        config.cookie_root_domain,
        http_date(expires),
    )
}

/// `Set-Cookie` value that clears the session: empty value, expiry in the
/// past.
pub(crate) fn clear_cookie_header(config: &AuthConfig) -> String {
    format!(
        "{SESSION_COOKIE}=; Path=/; Domain={}; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly",
        config.cookie_root_domain,
    )
}

fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
