// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OAuth2 callback: code exchange, profile fetch, session issuance.

use axum::{
    extract::{Query, State},
    http::header::SET_COOKIE,
    response::{Html, IntoResponse, Response},
};
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, error};
use url::Url;

use super::{pages, session_cookie_header};
use crate::{auth::SessionClaims, error::ApiError, state::AuthState};

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub r: Option<String>,
}

/// `GET /oauth2/authorized` — complete the authorization-code flow.
///
/// Any provider-side failure (exchange, profile, organizations) aborts with
/// 500 and no cookie; the user restarts the login. Missing `code`/`state`
/// is 401: the request did not come through an authorize redirect.
pub async fn oauth2_authorized(
    State(state): State<AuthState>,
    Query(params): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let code = match (params.code.as_deref(), params.state.as_deref()) {
        (Some(code), Some(st)) if !code.is_empty() && !st.is_empty() => code,
        _ => return Err(ApiError::unauthorized("missing code or state")),
    };

    // Must match the redirect_uri from the authorize step byte for byte;
    // GitLab rejects the exchange otherwise.
    let redirect_uri = callback_redirect_uri(&state, params.r.as_deref());

    let access_token = state
        .provider
        .exchange_code(code, redirect_uri.as_str())
        .await
        .map_err(|e| {
            error!(error = %e, "token exchange failed");
            ApiError::internal("token exchange failed")
        })?;

    let profile = state.provider.profile(&access_token).await.map_err(|e| {
        error!(error = %e, "profile fetch failed");
        ApiError::internal("profile fetch failed")
    })?;

    // The allow-list check at query time needs organizations; a failure
    // here would silently lock the user out later, so abort instead.
    let organizations = if state.provider.supports_organizations() {
        state
            .provider
            .organizations(&access_token)
            .await
            .map_err(|e| {
                error!(error = %e, "organization fetch failed");
                ApiError::internal("organization fetch failed")
            })?
    } else {
        Vec::new()
    };

    let claims = SessionClaims::new(&profile, &organizations, &access_token, &state.config);
    if state.config.write_debug {
        debug!(sub = %claims.sub, organizations = %claims.organizations, exp = claims.exp, "issuing session");
    }

    let token = state.tokens.sign(&claims).map_err(|e| {
        error!(error = %e, "session signing failed");
        ApiError::internal("session signing failed")
    })?;

    let expires = Utc
        .timestamp_opt(claims.exp, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let cookie = session_cookie_header(&token, &state.config, expires);

    let page = match params.r.as_deref() {
        Some(r) if !r.is_empty() => pages::signed_in_redirect(r),
        _ => pages::signed_in(),
    };

    Ok(([(SET_COOKIE, cookie)], Html(page)).into_response())
}

fn callback_redirect_uri(state: &AuthState, resource: Option<&str>) -> Url {
    let mut url = Url::parse(&state.config.callback_url())
        .expect("EXTERNAL_REDIRECT_DOMAIN was validated at startup");
    if let Some(r) = resource {
        if !r.is_empty() {
            url.query_pairs_mut().append_pair("r", r);
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::to_bytes,
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };

    fn mock_provider() -> Router {
        Router::new()
            .route(
                "/login/oauth/access_token",
                post(|| async {
                    Json(serde_json::json!({
                        "access_token": "gho_mock",
                        "token_type": "bearer",
                        "scope": "read:user"
                    }))
                }),
            )
            .route(
                "/user",
                get(|| async {
                    Json(serde_json::json!({"id": 42, "login": "alice"}))
                }),
            )
            .route(
                "/user/orgs",
                get(|| async { Json(serde_json::json!([{"login": "acme"}])) }),
            )
    }

    fn query(code: Option<&str>, state: Option<&str>, r: Option<&str>) -> CallbackQuery {
        CallbackQuery {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            r: r.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn missing_code_or_state_is_401() {
        let (state, _guard) = crate::test_util::auth_state(&[]);

        let err = oauth2_authorized(State(state.clone()), Query(query(None, Some("s"), None)))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let err = oauth2_authorized(State(state.clone()), Query(query(Some("c"), None, None)))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let err = oauth2_authorized(State(state), Query(query(Some(""), Some(""), None)))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn successful_callback_sets_cookie_and_redirects_to_resource() {
        let base = crate::test_util::serve(mock_provider()).await;
        let (state, _guard) = crate::test_util::auth_state_with_provider(&["acme"], Some(&base));

        let response = oauth2_authorized(
            State(state.clone()),
            Query(query(Some("the-code"), Some("the-state"), Some("/dashboard"))),
        )
        .await
        .expect("callback succeeds");

        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .expect("session cookie set")
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("edge_gateway_session="));
        assert!(cookie.contains("HttpOnly"));

        // The cookie value is a verifiable session token for alice@acme.
        let token = cookie
            .split(';')
            .next()
            .unwrap()
            .split_once('=')
            .unwrap()
            .1
            .to_string();
        let claims = state.tokens.verify(&token).expect("issued token verifies");
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.organizations, "acme");
        assert_eq!(claims.access_token, "gho_mock");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let page = String::from_utf8(body.to_vec()).unwrap();
        assert!(page.contains("/dashboard"));
    }

    #[tokio::test]
    async fn successful_callback_without_resource_shows_signed_in_page() {
        let base = crate::test_util::serve(mock_provider()).await;
        let (state, _guard) = crate::test_util::auth_state_with_provider(&[], Some(&base));

        let response = oauth2_authorized(
            State(state),
            Query(query(Some("the-code"), Some("the-state"), None)),
        )
        .await
        .expect("callback succeeds");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let page = String::from_utf8(body.to_vec()).unwrap();
        assert!(page.contains("You are signed in."));
        assert!(!page.contains("http-equiv"));
    }

    #[tokio::test]
    async fn failed_exchange_is_500_without_cookie() {
        let failing = Router::new().route(
            "/login/oauth/access_token",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "exchange down") }),
        );
        let base = crate::test_util::serve(failing).await;
        let (state, _guard) = crate::test_util::auth_state_with_provider(&[], Some(&base));

        let err = oauth2_authorized(
            State(state),
            Query(query(Some("the-code"), Some("the-state"), None)),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        let response = err.into_response();
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn failed_org_fetch_aborts_login() {
        let app = Router::new()
            .route(
                "/login/oauth/access_token",
                post(|| async {
                    Json(serde_json::json!({"access_token": "gho_mock"}))
                }),
            )
            .route(
                "/user",
                get(|| async { Json(serde_json::json!({"id": 1, "login": "alice"})) }),
            )
            .route(
                "/user/orgs",
                get(|| async { (StatusCode::BAD_GATEWAY, "orgs down") }),
            );
        let base = crate::test_util::serve(app).await;
        let (state, _guard) = crate::test_util::auth_state_with_provider(&[], Some(&base));

        let err = oauth2_authorized(
            State(state),
            Query(query(Some("c"), Some("s"), None)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
