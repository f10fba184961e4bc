// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Minimal HTML pages served by the auth service. No template engine; these
//! are a handful of static shells around one or two interpolated values.

/// Login page with a link per configured provider.
pub fn login(provider: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Sign in</title></head>
<body>
<h1>Sign in</h1>
<p><a href="/login/{provider}">Sign in with {provider}</a></p>
</body>
</html>
"#
    )
}

/// Post-callback page that bounces the browser to the resource it
/// originally asked for.
pub fn signed_in_redirect(resource: &str) -> String {
    let target = attr_escape(resource);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<title>Signed in</title>
<meta http-equiv="refresh" content="0; url={target}">
</head>
<body>
<p>You are signed in. <a href="{target}">Continue</a></p>
</body>
</html>
"#
    )
}

/// Post-callback page when no destination was requested.
pub fn signed_in() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>Signed in</title></head>
<body>
<p>You are signed in.</p>
</body>
</html>
"#
    .to_string()
}

/// Authenticated landing page.
pub fn home(login: &str) -> String {
    let login = attr_escape(login);
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Edge Gateway</title></head>
<body>
<h1>Edge Gateway</h1>
<p>Signed in as {login}. <a href="/logout/">Sign out</a></p>
</body>
</html>
"#
    )
}

/// Escape a value for interpolation into HTML text or attributes. The
/// redirect target comes from a query parameter, so it is attacker-chosen.
fn attr_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
