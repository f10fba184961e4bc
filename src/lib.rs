// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Edge Gateway
//!
//! Edge tier for a multi-tenant function platform, split into two
//! services that share this library:
//!
//! | Binary        | Role                                                        |
//! |---------------|-------------------------------------------------------------|
//! | `edge-router` | Wildcard-subdomain reverse proxy in front of the backend    |
//! | `edge-auth`   | OAuth2 login, session cookies, and authorization queries    |
//!
//! The router maps `{subdomain}.{domain}/{path}` onto
//! `{UPSTREAM_URL}function/{subdomain}-{path}` and consults the auth
//! service before serving anything under a protected prefix. The auth
//! service signs ES256 session tokens into a shared-domain cookie and
//! answers the router's `/q/` queries against a TTL-cached allow list.

pub mod api;
pub mod auth;
pub mod config;
pub mod customers;
pub mod error;
pub mod providers;
pub mod proxy;
pub mod state;

#[cfg(test)]
pub mod test_util;

/// Install the global tracing subscriber. `RUST_LOG` filters as usual;
/// `LOG_FORMAT=json` switches to line-delimited JSON for log shippers.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}

/// Resolves on SIGINT or SIGTERM so `axum::serve` can drain in-flight
/// requests before the process exits.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

