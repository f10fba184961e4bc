// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login page and authorize-redirect construction.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Redirect},
};
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use super::pages;
use crate::{error::ApiError, state::AuthState};

/// Optional original-destination carried through the login flow.
#[derive(Debug, Deserialize)]
pub struct ResourceQuery {
    #[serde(default)]
    pub r: Option<String>,
}

/// `GET|POST /login/` — static login page.
pub async fn login_page(State(state): State<AuthState>) -> Html<String> {
    Html(pages::login(state.config.provider.as_str()))
}

/// `GET /login/{provider}` — redirect the browser to the external
/// provider's authorization endpoint. Only the provider configured at
/// startup is routable; anything else is 404, not a fallback.
pub async fn authorize_redirect(
    State(state): State<AuthState>,
    Path(provider): Path<String>,
    Query(params): Query<ResourceQuery>,
) -> Result<Redirect, ApiError> {
    if provider != state.config.provider.as_str() {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "unknown provider"));
    }
    let url = build_authorize_url(&state, params.r.as_deref());
    Ok(Redirect::temporary(url.as_str()))
}

/// Provider authorize URL whose `redirect_uri` points back at this
/// service's callback, itself carrying the original destination as `r` so
/// it survives the round trip through the external provider.
///
/// The `state` value is a fresh UUID per redirect; sessions are stateless,
/// so the callback only checks its presence (basic CSRF hygiene, nothing
/// more).
pub(crate) fn build_authorize_url(state: &AuthState, resource: Option<&str>) -> Url {
    let mut callback = Url::parse(&state.config.callback_url())
        .expect("EXTERNAL_REDIRECT_DOMAIN was validated at startup");
    if let Some(r) = resource {
        if !r.is_empty() {
            callback.query_pairs_mut().append_pair("r", r);
        }
    }

    let state_value = Uuid::new_v4().simple().to_string();
    state.provider.authorize_url(&state_value, callback.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn login_page_renders_provider_link() {
        let (state, _guard) = crate::test_util::auth_state(&[]);
        let Html(page) = login_page(State(state)).await;
        assert!(page.contains("/login/github"));
    }

    #[tokio::test]
    async fn unknown_provider_is_404() {
        let (state, _guard) = crate::test_util::auth_state(&[]);
        let err = authorize_redirect(
            State(state),
            Path("gitlab".to_string()),
            Query(ResourceQuery { r: None }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn authorize_url_nests_resource_inside_redirect_uri() {
        let (state, _guard) = crate::test_util::auth_state(&[]);
        let url = build_authorize_url(&state, Some("/dashboard"));

        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        let redirect_uri = Url::parse(&pairs["redirect_uri"]).unwrap();
        assert_eq!(
            redirect_uri.as_str().split('?').next().unwrap(),
            "https://auth.system.example.com/oauth2/authorized"
        );
        let inner: HashMap<_, _> = redirect_uri.query_pairs().into_owned().collect();
        assert_eq!(inner["r"], "/dashboard");
    }

    #[test]
    fn authorize_url_without_resource_has_bare_redirect_uri() {
        let (state, _guard) = crate::test_util::auth_state(&[]);
        let url = build_authorize_url(&state, None);

        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs["redirect_uri"],
            "https://auth.system.example.com/oauth2/authorized"
        );
        assert!(!pairs["state"].is_empty());
    }

    #[test]
    fn state_value_is_unique_per_redirect() {
        let (state, _guard) = crate::test_util::auth_state(&[]);
        let first = build_authorize_url(&state, None);
        let second = build_authorize_url(&state, None);

        let get_state = |url: &Url| {
            url.query_pairs()
                .find(|(k, _)| k == "state")
                .map(|(_, v)| v.into_owned())
                .unwrap()
        };
        assert_ne!(get_state(&first), get_state(&second));
    }
}
