// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Provider Clients
//!
//! OAuth2 providers the auth service can delegate to. The active provider is
//! a closed variant selected once at startup from `OAUTH_PROVIDER`; unknown
//! identifiers refuse to start rather than failing per request.
//!
//! Each variant knows three endpoints: the browser-facing authorize URL, the
//! server-to-server code-exchange endpoint, and the "current user" profile
//! endpoint. GitHub additionally exposes organization memberships, which feed
//! the allow-list check; GitLab has no organization concept here and leaves
//! that claim empty.
//!
//! None of the calls retry. A failed exchange or profile fetch aborts the
//! login flow and the user starts over.

use std::{str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config::{AuthConfig, ConfigError};

const GITHUB_WEB_BASE: &str = "https://github.com";
const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_DEFAULT_SCOPES: &str = "read:user,read:org";
const GITLAB_DEFAULT_SCOPES: &str = "read_user";

/// Outbound provider calls share one budget; the caller aborts the whole
/// login flow on failure, so there is no point in a longer wait.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

/// Supported identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    GitHub,
    GitLab,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::GitLab => "gitlab",
        }
    }

    pub fn default_scopes(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => GITHUB_DEFAULT_SCOPES,
            ProviderKind::GitLab => GITLAB_DEFAULT_SCOPES,
        }
    }

    /// Whether the provider has an organization concept worth fetching.
    pub fn supports_organizations(&self) -> bool {
        matches!(self, ProviderKind::GitHub)
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(ProviderKind::GitHub),
            "gitlab" => Ok(ProviderKind::GitLab),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-neutral view of the authenticated identity. Built once per
/// OAuth2 callback from the provider's profile response; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: u64,
    pub login: String,
    pub name: String,
    pub email: Option<String>,
    pub two_factor: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),

    #[error("provider returned HTTP {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("provider response was invalid: {0}")]
    InvalidResponse(String),
}

/// Client for the configured identity provider.
///
/// Holds a single pooled HTTP client; every call is one request with the
/// shared timeout and no retries.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    kind: ProviderKind,
    /// Override for self-hosted providers; also covers GitHub Enterprise.
    base_url: Option<Url>,
    client_id: String,
    client_secret: String,
    scopes: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    two_factor_authentication: Option<bool>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GitHubOrg {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GitLabUser {
    id: u64,
    username: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    two_factor_enabled: Option<bool>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl ProviderClient {
    pub fn new(config: &AuthConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .user_agent("edge-auth")
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            kind: config.provider,
            base_url: config.provider_base_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scopes: config.scopes.clone(),
            http,
        })
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn supports_organizations(&self) -> bool {
        self.kind.supports_organizations()
    }

    /// Browser-facing authorization URL for the start of the code flow.
    ///
    /// `redirect_uri` must be the exact callback URL of this service,
    /// including its own `r` query parameter; the provider echoes it back
    /// untouched.
    pub fn authorize_url(&self, state: &str, redirect_uri: &str) -> Url {
        let mut url = match self.kind {
            ProviderKind::GitHub => self.web_endpoint("login/oauth/authorize"),
            ProviderKind::GitLab => self.web_endpoint("oauth/authorize"),
        };
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.client_id);
            query.append_pair("scope", &self.scopes);
            query.append_pair("state", state);
            query.append_pair("allow_signup", "0");
            if self.kind == ProviderKind::GitLab {
                query.append_pair("response_type", "code");
            }
            query.append_pair("redirect_uri", redirect_uri);
        }
        url
    }

    /// Exchange an authorization code for an access token.
    ///
    /// GitLab requires `grant_type` and the exact `redirect_uri` from the
    /// authorize step; GitHub ignores both.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, ProviderError> {
        let endpoint = match self.kind {
            ProviderKind::GitHub => self.web_endpoint("login/oauth/access_token"),
            ProviderKind::GitLab => self.web_endpoint("oauth/token"),
        };

        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
        ];
        if self.kind == ProviderKind::GitLab {
            form.push(("grant_type", "authorization_code"));
            form.push(("redirect_uri", redirect_uri));
        }

        let response = self
            .http
            .post(endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                endpoint: endpoint.to_string(),
                status: response.status().as_u16(),
            });
        }

        let token: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(token.access_token)
    }

    /// Fetch the provider's "current user" and map it into the neutral
    /// [`Profile`].
    pub async fn profile(&self, access_token: &str) -> Result<Profile, ProviderError> {
        match self.kind {
            ProviderKind::GitHub => {
                let user: GitHubUser = self
                    .get_json(self.api_endpoint("user"), access_token)
                    .await?;
                Ok(Profile {
                    id: user.id,
                    login: user.login,
                    name: user.name.unwrap_or_default(),
                    email: user.email,
                    two_factor: user.two_factor_authentication.unwrap_or(false),
                    created_at: user.created_at,
                })
            }
            ProviderKind::GitLab => {
                let user: GitLabUser = self
                    .get_json(self.api_endpoint("api/v4/user"), access_token)
                    .await?;
                Ok(Profile {
                    id: user.id,
                    login: user.username,
                    name: user.name.unwrap_or_default(),
                    email: user.email,
                    two_factor: user.two_factor_enabled.unwrap_or(false),
                    created_at: user.created_at,
                })
            }
        }
    }

    /// Organization logins the identity belongs to. Only meaningful for
    /// providers where [`supports_organizations`](Self::supports_organizations)
    /// is true; callers must not invoke it otherwise.
    pub async fn organizations(&self, access_token: &str) -> Result<Vec<String>, ProviderError> {
        debug_assert!(self.supports_organizations());
        let orgs: Vec<GitHubOrg> = self
            .get_json(self.api_endpoint("user/orgs"), access_token)
            .await?;
        Ok(orgs.into_iter().map(|org| org.login).collect())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: Url,
        access_token: &str,
    ) -> Result<T, ProviderError> {
        // GitHub's v3 API uses the `token` scheme; GitLab wants `Bearer`.
        let auth_header = match self.kind {
            ProviderKind::GitHub => format!("token {access_token}"),
            ProviderKind::GitLab => format!("Bearer {access_token}"),
        };

        let response = self
            .http
            .get(endpoint.clone())
            .header(reqwest::header::AUTHORIZATION, auth_header)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(ProviderError::Status {
                endpoint: endpoint.to_string(),
                status: response.status().as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    /// Browser/web endpoint base (authorize + token exchange).
    fn web_endpoint(&self, path: &str) -> Url {
        let base = match &self.base_url {
            Some(base) => base.clone(),
            None => Url::parse(GITHUB_WEB_BASE).expect("static URL parses"),
        };
        join(base, path)
    }

    /// REST API base (profile + organizations). GitHub serves its API from
    /// a separate host; self-hosted overrides keep everything on one base.
    fn api_endpoint(&self, path: &str) -> Url {
        let base = match &self.base_url {
            Some(base) => base.clone(),
            None => Url::parse(GITHUB_API_BASE).expect("static URL parses"),
        };
        join(base, path)
    }
}

fn join(base: Url, path: &str) -> Url {
    let normalized = format!("{}/{}", base.as_str().trim_end_matches('/'), path);
    Url::parse(&normalized).expect("joining a relative path onto a valid base")
}
