// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OAuth2 sign-in and session service.

use std::{net::SocketAddr, process::ExitCode};

use tracing::{error, info};

use edge_gateway::{api, config::AuthConfig, state::AuthState};

#[tokio::main]
async fn main() -> ExitCode {
    edge_gateway::init_tracing();

    let config = match AuthConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            return ExitCode::FAILURE;
        }
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let state = match AuthState::from_config(config) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "failed to initialize auth state");
            return ExitCode::FAILURE;
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, %addr, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!(%addr, "edge-auth listening");
    if let Err(e) = axum::serve(listener, api::router(state))
        .with_graceful_shutdown(edge_gateway::shutdown_signal())
        .await
    {
        error!(error = %e, "server error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
