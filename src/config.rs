// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Both services resolve their configuration from the process environment
//! exactly once at startup. Anything missing or malformed is a fatal
//! [`ConfigError`] and the process refuses to start.
//!
//! ## `edge-auth` Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `PORT` | Server bind port | `8080` |
//! | `OAUTH_PROVIDER` | Identity provider (`github` or `gitlab`) | Required |
//! | `OAUTH_PROVIDER_BASE_URL` | Base URL for self-hosted providers | Required for `gitlab` |
//! | `OAUTH_CLIENT_ID` | OAuth2 application client id | Required |
//! | `OAUTH_CLIENT_SECRET` | OAuth2 application client secret | Required unless secret file exists |
//! | `OAUTH_CLIENT_SECRET_PATH` | Mounted secret file, takes precedence | `/var/secrets/edge-auth/oauth-client-secret` |
//! | `EXTERNAL_REDIRECT_DOMAIN` | Public base URL of this service | Required |
//! | `OAUTH_SCOPES` | Requested OAuth scopes | Provider default |
//! | `COOKIE_ROOT_DOMAIN` | Session cookie domain / token audience | Required |
//! | `COOKIE_EXPIRY_HOURS` | Session lifetime | `48` |
//! | `PRIVATE_KEY_PATH` | ES256 private key (PEM) | Required |
//! | `PUBLIC_KEY_PATH` | ES256 public key (PEM) | Required |
//! | `CUSTOMERS_URL` / `CUSTOMERS_FILE` | Allow-list source (exactly one) | Required |
//! | `CUSTOMERS_CACHE_TTL_SECONDS` | Allow-list cache validity | `300` |
//! | `PROTECTED_PREFIXES` | Comma-separated protected path prefixes | System dashboard/list/metrics |
//! | `WRITE_DEBUG` | Log claims and cache lookups (logs access tokens!) | `false` |
//!
//! ## `edge-router` Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `PORT` | Server bind port | `8080` |
//! | `UPSTREAM_URL` | Backend gateway base URL | Required |
//! | `AUTH_URL` | edge-auth base URL | Required |
//! | `AUTH_HOST` | Subdomain label proxied straight to edge-auth | `auth` |
//! | `UPSTREAM_TIMEOUT_SECONDS` | Backend call budget | `60` |
//! | `AUTH_TIMEOUT_SECONDS` | Authorization query budget | `5` |
//!
//! Shared by both binaries: `LOG_FORMAT` (`json` for line-delimited JSON,
//! anything else for human-readable output) and `RUST_LOG` (default `info`).

use std::{env, fs, path::Path, time::Duration};

use thiserror::Error;
use url::Url;

use crate::providers::ProviderKind;

/// Name of the session cookie set by `edge-auth` and read back on `/q/`.
pub const SESSION_COOKIE: &str = "edge_gateway_session";

/// Default mounted location of the OAuth client secret.
const DEFAULT_CLIENT_SECRET_PATH: &str = "/var/secrets/edge-auth/oauth-client-secret";

/// Default protected path prefixes consulted by the authorization query.
const DEFAULT_PROTECTED_PREFIXES: &str =
    "/function/system-dashboard,/function/system-list-functions,/function/system-metrics";

/// Fatal startup configuration failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("unsupported OAuth provider {0:?} (expected \"github\" or \"gitlab\")")]
    UnsupportedProvider(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse key file {path}: {source}")]
    Key {
        path: String,
        source: jsonwebtoken::errors::Error,
    },
}

/// Where the allow-list is loaded from.
#[derive(Debug, Clone)]
pub enum CustomerSource {
    /// Remote URL returning newline-separated names.
    Url(Url),
    /// Local file with the same format.
    File(String),
}

/// Immutable configuration for the `edge-auth` service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub port: u16,
    pub provider: ProviderKind,
    /// Base URL for self-hosted providers (GitLab). Ignored for GitHub.
    pub provider_base_url: Option<Url>,
    pub client_id: String,
    pub client_secret: String,
    /// Public base URL of this service, used to build `redirect_uri`.
    pub external_redirect_domain: String,
    pub scopes: String,
    /// Cookie `Domain` attribute and session token audience.
    pub cookie_root_domain: String,
    pub cookie_expiry_hours: i64,
    pub private_key_path: String,
    pub public_key_path: String,
    pub customers_source: CustomerSource,
    pub customers_ttl: Duration,
    pub protected_prefixes: Vec<String>,
    /// Logs claim contents and cache lookups, including access tokens.
    /// Never enable outside of debugging sessions.
    pub write_debug: bool,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let provider: ProviderKind = env_required("OAUTH_PROVIDER")?.parse()?;

        let provider_base_url = match env::var("OAUTH_PROVIDER_BASE_URL") {
            Ok(raw) => Some(parse_url("OAUTH_PROVIDER_BASE_URL", &raw)?),
            Err(_) => None,
        };
        if provider == ProviderKind::GitLab && provider_base_url.is_none() {
            return Err(ConfigError::MissingEnv("OAUTH_PROVIDER_BASE_URL"));
        }

        let customers_source = match (env::var("CUSTOMERS_URL"), env::var("CUSTOMERS_FILE")) {
            (Ok(url), Err(_)) => CustomerSource::Url(parse_url("CUSTOMERS_URL", &url)?),
            (Err(_), Ok(path)) => CustomerSource::File(path),
            (Ok(_), Ok(_)) => {
                return Err(ConfigError::Invalid {
                    name: "CUSTOMERS_URL",
                    reason: "CUSTOMERS_URL and CUSTOMERS_FILE are mutually exclusive".to_string(),
                })
            }
            (Err(_), Err(_)) => return Err(ConfigError::MissingEnv("CUSTOMERS_URL")),
        };

        let scopes = match env::var("OAUTH_SCOPES") {
            Ok(s) => s,
            Err(_) => provider.default_scopes().to_string(),
        };

        // Validated here so callback_url() can assume it parses.
        let external_redirect_domain =
            trim_trailing_slash(env_required("EXTERNAL_REDIRECT_DOMAIN")?);
        parse_url("EXTERNAL_REDIRECT_DOMAIN", &external_redirect_domain)?;

        Ok(Self {
            port: env_parse("PORT", 8080)?,
            provider,
            provider_base_url,
            client_id: env_required("OAUTH_CLIENT_ID")?,
            client_secret: load_client_secret()?,
            external_redirect_domain,
            scopes,
            cookie_root_domain: env_required("COOKIE_ROOT_DOMAIN")?,
            cookie_expiry_hours: env_parse("COOKIE_EXPIRY_HOURS", 48)?,
            private_key_path: env_required("PRIVATE_KEY_PATH")?,
            public_key_path: env_required("PUBLIC_KEY_PATH")?,
            customers_source,
            customers_ttl: Duration::from_secs(env_parse("CUSTOMERS_CACHE_TTL_SECONDS", 300)?),
            protected_prefixes: split_csv(&env_or_default(
                "PROTECTED_PREFIXES",
                DEFAULT_PROTECTED_PREFIXES,
            )),
            write_debug: env_or_default("WRITE_DEBUG", "false") == "true",
        })
    }

    /// Absolute URL of the OAuth2 callback endpoint on this service.
    pub fn callback_url(&self) -> String {
        format!("{}/oauth2/authorized", self.external_redirect_domain)
    }
}

/// Immutable configuration for the `edge-router` service.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub port: u16,
    /// Backend gateway base URL, normalized to end with `/`.
    pub upstream_url: Url,
    /// edge-auth base URL, normalized to end with `/`.
    pub auth_url: Url,
    /// Subdomain label whose requests are proxied transparently to edge-auth.
    pub auth_host: String,
    pub upstream_timeout: Duration,
    pub auth_timeout: Duration,
}

impl RouterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: env_parse("PORT", 8080)?,
            upstream_url: parse_base_url("UPSTREAM_URL", &env_required("UPSTREAM_URL")?)?,
            auth_url: parse_base_url("AUTH_URL", &env_required("AUTH_URL")?)?,
            auth_host: env_or_default("AUTH_HOST", "auth"),
            upstream_timeout: Duration::from_secs(env_parse("UPSTREAM_TIMEOUT_SECONDS", 60)?),
            auth_timeout: Duration::from_secs(env_parse("AUTH_TIMEOUT_SECONDS", 5)?),
        })
    }
}

/// OAuth client secret, from the mounted secret file when present, the
/// environment otherwise. The file wins so rotated secrets do not require
/// re-deploying environment variables.
fn load_client_secret() -> Result<String, ConfigError> {
    let path = env_or_default("OAUTH_CLIENT_SECRET_PATH", DEFAULT_CLIENT_SECRET_PATH);
    if Path::new(&path).exists() {
        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io { path, source })?;
        return Ok(raw.trim().to_string());
    }
    env_required("OAUTH_CLIENT_SECRET")
}

pub(crate) fn env_required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnv(name)),
    }
}

pub(crate) fn env_or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

/// Parse a base URL and normalize it to end with a single `/` so joining
/// paths onto it never drops the last path segment.
fn parse_base_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let normalized = format!("{}/", raw.trim_end_matches('/'));
    parse_url(name, &normalized)
}

fn trim_trailing_slash(raw: String) -> String {
    raw.trim_end_matches('/').to_string()
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
