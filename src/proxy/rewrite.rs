// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pure URL plumbing for the reverse proxy: host parsing, function-path
//! construction, and the nested-redirect rewrite.
//!
//! The rewrite is the most error-prone logic in the gateway, so it lives
//! here as an explicit decode → mutate → re-encode pass with its own
//! fixtures instead of inline string edits in the handler.

use url::Url;

/// First label of the `Host` header, with any port stripped.
///
/// Requires at least two non-empty `.`-separated labels; a bare host like
/// `localhost` cannot carry a function subdomain.
pub fn subdomain(host: &str) -> Option<&str> {
    let host = host.split(':').next().unwrap_or(host);
    let mut labels = host.split('.');
    let first = labels.next()?;
    let second = labels.next()?;
    if first.is_empty() || second.is_empty() {
        return None;
    }
    Some(first)
}

/// Request path with every leading slash stripped; the remainder becomes
/// the function-name suffix. `None` when nothing is left.
pub fn function_path(path: &str) -> Option<&str> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// `{base}function/{subdomain}-{path}`, carrying the original query string.
pub fn upstream_url(
    base: &Url,
    subdomain: &str,
    function_path: &str,
    query: Option<&str>,
) -> Result<Url, url::ParseError> {
    let mut raw = format!(
        "{}function/{}-{}",
        base.as_str(),
        subdomain,
        function_path
    );
    if let Some(query) = query {
        raw.push('?');
        raw.push_str(query);
    }
    Url::parse(&raw)
}

/// Full request URL as the client sent it, scheme taken from the ingress.
pub fn original_url(scheme: &str, host: &str, path_and_query: &str) -> String {
    format!("{scheme}://{host}{path_and_query}")
}

/// Rewrite the `r` parameter nested inside the `redirect_uri` parameter of
/// an authorize URL, so the browser lands back on `original` after the
/// whole login round trip.
///
/// Both levels are decoded and re-encoded through [`Url`]; parameters other
/// than the targeted ones pass through unchanged, and a missing `r` is
/// appended rather than erroring.
pub fn rewrite_redirect_location(location: &str, original: &str) -> Result<String, url::ParseError> {
    let mut outer = Url::parse(location)?;

    let outer_pairs: Vec<(String, String)> = outer
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut rewritten = Vec::with_capacity(outer_pairs.len());
    for (key, value) in outer_pairs {
        if key == "redirect_uri" {
            rewritten.push((key, set_inner_resource(&value, original)?));
        } else {
            rewritten.push((key, value));
        }
    }

    {
        let mut query = outer.query_pairs_mut();
        query.clear();
        for (key, value) in &rewritten {
            query.append_pair(key, value);
        }
    }
    Ok(outer.into())
}

fn set_inner_resource(redirect_uri: &str, original: &str) -> Result<String, url::ParseError> {
    let mut inner = Url::parse(redirect_uri)?;

    let inner_pairs: Vec<(String, String)> = inner
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut query = inner.query_pairs_mut();
        query.clear();
        let mut replaced = false;
        for (key, value) in &inner_pairs {
            if key == "r" {
                query.append_pair("r", original);
                replaced = true;
            } else {
                query.append_pair(key, value);
            }
        }
        if !replaced {
            query.append_pair("r", original);
        }
    }
    Ok(inner.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn subdomain_requires_two_labels() {
        assert_eq!(subdomain("system.example.xyz"), Some("system"));
        assert_eq!(subdomain("system.example.xyz:8080"), Some("system"));
        assert_eq!(subdomain("auth.local"), Some("auth"));
        assert_eq!(subdomain("localhost"), None);
        assert_eq!(subdomain("localhost:8080"), None);
        assert_eq!(subdomain(".example"), None);
        assert_eq!(subdomain("system."), None);
        assert_eq!(subdomain(""), None);
    }

    #[test]
    fn function_path_strips_all_leading_slashes() {
        assert_eq!(function_path("/dashboard"), Some("dashboard"));
        assert_eq!(function_path("/////dashboard"), Some("dashboard"));
        assert_eq!(function_path("/a/b"), Some("a/b"));
        assert_eq!(function_path("/"), None);
        assert_eq!(function_path("////"), None);
        assert_eq!(function_path(""), None);
    }

    #[test]
    fn upstream_url_joins_subdomain_and_path() {
        let base = Url::parse("http://gateway:8080/").unwrap();
        let url = upstream_url(&base, "system", "dashboard", None).unwrap();
        assert_eq!(url.as_str(), "http://gateway:8080/function/system-dashboard");

        let url = upstream_url(&base, "system", "dashboard", Some("page=2")).unwrap();
        assert_eq!(
            url.as_str(),
            "http://gateway:8080/function/system-dashboard?page=2"
        );
    }

    #[test]
    fn rewrite_replaces_nested_resource() {
        let location = "https://github.com/login/oauth/authorize?client_id=cid&scope=read%3Auser&state=s1&allow_signup=0&redirect_uri=https%3A%2F%2Fauth.system.example.com%2Foauth2%2Fauthorized%3Fr%3Dhttp%3A%2F%2Fgateway%3A8080%2Ffunction%2Fsystem-dashboard";
        let rewritten =
            rewrite_redirect_location(location, "http://system.example.xyz/dashboard?page=2")
                .unwrap();

        let outer = Url::parse(&rewritten).unwrap();
        let outer_pairs: HashMap<_, _> = outer.query_pairs().into_owned().collect();
        assert_eq!(outer_pairs["client_id"], "cid");
        assert_eq!(outer_pairs["scope"], "read:user");
        assert_eq!(outer_pairs["state"], "s1");
        assert_eq!(outer_pairs["allow_signup"], "0");

        let inner = Url::parse(&outer_pairs["redirect_uri"]).unwrap();
        assert_eq!(inner.host_str(), Some("auth.system.example.com"));
        assert_eq!(inner.path(), "/oauth2/authorized");
        let inner_pairs: HashMap<_, _> = inner.query_pairs().into_owned().collect();
        assert_eq!(
            inner_pairs["r"],
            "http://system.example.xyz/dashboard?page=2"
        );
    }

    #[test]
    fn rewrite_appends_resource_when_missing() {
        let location = "https://github.com/login/oauth/authorize?client_id=cid&redirect_uri=https%3A%2F%2Fauth.system.example.com%2Foauth2%2Fauthorized";
        let rewritten = rewrite_redirect_location(location, "/dashboard").unwrap();

        let outer = Url::parse(&rewritten).unwrap();
        let outer_pairs: HashMap<_, _> = outer.query_pairs().into_owned().collect();
        let inner = Url::parse(&outer_pairs["redirect_uri"]).unwrap();
        let inner_pairs: HashMap<_, _> = inner.query_pairs().into_owned().collect();
        assert_eq!(inner_pairs["r"], "/dashboard");
    }

    #[test]
    fn rewrite_passes_through_location_without_redirect_uri() {
        let location = "https://github.com/login/oauth/authorize?client_id=cid";
        let rewritten = rewrite_redirect_location(location, "/dashboard").unwrap();
        let outer = Url::parse(&rewritten).unwrap();
        let pairs: HashMap<_, _> = outer.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "cid");
        assert!(!pairs.contains_key("r"));
    }

    #[test]
    fn rewrite_rejects_unparsable_location() {
        assert!(rewrite_redirect_location("not a url", "/dashboard").is_err());
    }

    #[test]
    fn original_url_concatenates_parts() {
        assert_eq!(
            original_url("https", "system.example.xyz", "/dashboard?page=2"),
            "https://system.example.xyz/dashboard?page=2"
        );
    }
}
