// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Homepage and logout.

use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use super::{clear_cookie_header, pages};
use crate::{config::SESSION_COOKIE, state::AuthState};

/// `GET /` — landing page for a valid session, otherwise off to login with
/// the homepage as the post-login destination.
pub async fn homepage(State(state): State<AuthState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(claims) = state.tokens.verify(cookie.value()) {
            return Html(pages::home(&claims.sub)).into_response();
        }
    }
    Redirect::temporary("/login/?r=/").into_response()
}

/// `GET /logout/` — overwrite the cookie with an empty, already-expired
/// value. There is no server-side session to destroy.
pub async fn logout(State(state): State<AuthState>) -> Response {
    let cookie = clear_cookie_header(&state.config);
    ([(SET_COOKIE, cookie)], "signed out\n").into_response()
}
