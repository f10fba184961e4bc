// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::{
    auth::TokenService,
    config::{AuthConfig, ConfigError, RouterConfig},
    customers::Customers,
    providers::ProviderClient,
};

/// Shared state of the `edge-auth` service. Everything inside is immutable
/// after startup except the allow-list cache, which synchronizes itself.
#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<AuthConfig>,
    pub provider: Arc<ProviderClient>,
    pub customers: Customers,
    pub tokens: Arc<TokenService>,
}

impl AuthState {
    pub fn from_config(config: AuthConfig) -> Result<Self, ConfigError> {
        let tokens = TokenService::from_key_files(
            &config.private_key_path,
            &config.public_key_path,
            config.cookie_root_domain.clone(),
        )?;
        let provider = ProviderClient::new(&config).map_err(|e| ConfigError::Invalid {
            name: "OAUTH_PROVIDER",
            reason: e.to_string(),
        })?;
        let customers = Customers::new(config.customers_source.clone(), config.customers_ttl);

        Ok(Self {
            config: Arc::new(config),
            provider: Arc::new(provider),
            customers,
            tokens: Arc::new(tokens),
        })
    }
}

/// Shared state of the `edge-router` service: config plus one pooled HTTP
/// client per outbound concern, each with its own timeout. Redirect
/// following is disabled on both so `Location` headers pass through
/// untouched.
#[derive(Clone)]
pub struct RouterState {
    pub config: Arc<RouterConfig>,
    /// Client for authorization queries against edge-auth.
    pub auth_client: reqwest::Client,
    /// Client for proxied calls to the backend gateway.
    pub upstream_client: reqwest::Client,
}

impl RouterState {
    pub fn from_config(config: RouterConfig) -> Result<Self, ConfigError> {
        let auth_client = reqwest::Client::builder()
            .timeout(config.auth_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConfigError::Invalid {
                name: "AUTH_TIMEOUT_SECONDS",
                reason: e.to_string(),
            })?;
        let upstream_client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConfigError::Invalid {
                name: "UPSTREAM_TIMEOUT_SECONDS",
                reason: e.to_string(),
            })?;

        Ok(Self {
            config: Arc::new(config),
            auth_client,
            upstream_client,
        })
    }
}
