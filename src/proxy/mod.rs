// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Reverse Proxy
//!
//! The `edge-router` service. Every request is dispatched on its Host
//! header: the first subdomain label names the backend function, so
//! `http://system.example.xyz/dashboard` becomes a call to
//! `{UPSTREAM_URL}function/system-dashboard`.
//!
//! Before forwarding, the router asks `edge-auth` whether the request may
//! proceed (`/q/?r=<upstream>`), passing the caller's cookies along. A
//! redirect answer is rewritten so its nested `redirect_uri` carries the
//! client's original URL, then bounced to the browser; 401 passes through;
//! 200 proxies. Requests for the auth subdomain itself skip the check and
//! proxy transparently so the login endpoints stay reachable through the
//! gateway.
//!
//! Bodies stream in both directions; nothing is buffered. Cancellation
//! rides on the request future: when the client goes away, the in-flight
//! upstream call is dropped with it.

pub mod rewrite;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        header::{CONTENT_LENGTH, COOKIE, HOST, LOCATION, REFERER},
        request::Parts,
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use url::Url;

use crate::state::RouterState;

pub fn router(state: RouterState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .fallback(proxy)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe; the method router answers 405 for anything but GET/HEAD.
async fn healthz() -> &'static str {
    "OK"
}

/// Outcome of the authorization query against edge-auth.
enum AuthDecision {
    Allow,
    Unauthorized,
    /// Authorize URL to bounce the browser to, pre-rewrite.
    Redirect(String),
    /// Any other status from `/q/` is forwarded as-is.
    Other(StatusCode),
    /// edge-auth itself could not be reached or answered garbage.
    Unreachable,
}

/// Catch-all proxy handler.
pub async fn proxy(State(state): State<RouterState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let Some(host) = host_header(&parts) else {
        return (StatusCode::BAD_REQUEST, "host header required").into_response();
    };
    let Some(sub) = rewrite::subdomain(&host) else {
        return (
            StatusCode::BAD_REQUEST,
            "host must carry a function subdomain",
        )
            .into_response();
    };

    // The auth subdomain bypasses dispatch entirely: full path, no
    // function-name rewriting, no authorization query.
    if sub == state.config.auth_host {
        let raw = format!(
            "{}{}",
            state.config.auth_url,
            parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/")
                .trim_start_matches('/')
        );
        let Ok(target) = Url::parse(&raw) else {
            return (StatusCode::BAD_REQUEST, "bad request path").into_response();
        };
        return forward(&state.auth_client, parts, body, target).await;
    }

    let Some(function_path) = rewrite::function_path(parts.uri.path()) else {
        return (StatusCode::NOT_FOUND, "function name required").into_response();
    };
    let upstream = match rewrite::upstream_url(
        &state.config.upstream_url,
        sub,
        function_path,
        parts.uri.query(),
    ) {
        Ok(url) => url,
        Err(_) => return (StatusCode::BAD_REQUEST, "bad request path").into_response(),
    };

    match authorize(&state, &parts.headers, upstream.as_str()).await {
        AuthDecision::Allow => {}
        AuthDecision::Unauthorized => {
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response()
        }
        AuthDecision::Redirect(location) => {
            let scheme = forwarded_proto(&parts.headers);
            let original = rewrite::original_url(
                scheme,
                &host,
                parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/"),
            );
            return match rewrite::rewrite_redirect_location(&location, &original) {
                Ok(target) => (
                    StatusCode::TEMPORARY_REDIRECT,
                    [(LOCATION, target)],
                )
                    .into_response(),
                Err(e) => {
                    warn!(error = %e, location, "unusable redirect from auth server");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "bad redirect from auth server",
                    )
                        .into_response()
                }
            };
        }
        AuthDecision::Other(status) => return status.into_response(),
        AuthDecision::Unreachable => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "bad gateway reaching auth server",
            )
                .into_response()
        }
    }

    debug!(upstream = %upstream, "proxying");
    forward(&state.upstream_client, parts, body, upstream).await
}

/// Ask edge-auth whether `resource` may be served, forwarding the caller's
/// cookies and referrer so the session check sees them.
async fn authorize(state: &RouterState, headers: &HeaderMap, resource: &str) -> AuthDecision {
    let mut url = match Url::parse(&format!("{}q/", state.config.auth_url)) {
        Ok(url) => url,
        Err(_) => return AuthDecision::Unreachable,
    };
    url.query_pairs_mut().append_pair("r", resource);

    let mut request = state.auth_client.get(url);
    for name in [COOKIE, REFERER] {
        if let Some(value) = headers.get(&name) {
            request = request.header(name, value);
        }
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "authorization query failed");
            return AuthDecision::Unreachable;
        }
    };

    let status = response.status();
    if status == StatusCode::OK {
        AuthDecision::Allow
    } else if status == StatusCode::UNAUTHORIZED {
        AuthDecision::Unauthorized
    } else if status.is_redirection() {
        match response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
        {
            Some(location) => AuthDecision::Redirect(location.to_string()),
            None => AuthDecision::Unreachable,
        }
    } else {
        AuthDecision::Other(status)
    }
}

/// Stream the request to `target` and the answer back. Headers and status
/// pass through both ways; the per-client timeout bounds the call.
async fn forward(
    client: &reqwest::Client,
    parts: Parts,
    body: Body,
    target: Url,
) -> Response {
    let mut headers = parts.headers;
    // The upstream host comes from the target URL; the inbound values
    // would be wrong, and the length changes with re-streaming.
    headers.remove(HOST);
    headers.remove(CONTENT_LENGTH);

    let result = client
        .request(parts.method, target)
        .headers(headers)
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await;

    let upstream_response = match result {
        Ok(response) => response,
        Err(e) => return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    };

    let mut builder = Response::builder().status(upstream_response.status());
    for (name, value) in upstream_response.headers() {
        builder = builder.header(name, value);
    }
    builder
        .body(Body::from_stream(upstream_response.bytes_stream()))
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}

fn host_header(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.host().map(str::to_string))
}

fn forwarded_proto(headers: &HeaderMap) -> &str {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http")
}
