// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Customers Allow-List Cache
//!
//! Time-bounded cache of the identities (user logins and organization
//! names) permitted to use the platform, loaded from a remote URL or a
//! local file of newline-separated names.
//!
//! ## Semantics
//!
//! - Lookups are case-insensitive; entries are trimmed and lower-cased on
//!   load.
//! - The cache starts empty and already expired, so the first lookup
//!   triggers a fetch.
//! - A failed refresh is logged and the stale set keeps serving; lookups
//!   never surface fetch errors (fail-open on availability, fail-closed on
//!   membership: an identity that was never loaded is simply not allowed).
//! - Concurrent expired lookups may each refresh; the set is replaced
//!   atomically so readers never observe a half-built list.

use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::CustomerSource;

#[derive(Debug, Error)]
pub enum CustomersError {
    #[error("customers fetch failed: {0}")]
    Request(String),

    #[error("customers source returned HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("failed to read customers file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

struct CacheEntry {
    names: HashSet<String>,
    /// `None` until the first successful fetch; forces the initial refresh.
    fetched_at: Option<Instant>,
}

impl CacheEntry {
    fn expired(&self, ttl: Duration) -> bool {
        match self.fetched_at {
            Some(at) => at.elapsed() >= ttl,
            None => true,
        }
    }
}

/// Shared allow-list handle; cheap to clone, one cache per process.
#[derive(Clone)]
pub struct Customers {
    source: CustomerSource,
    ttl: Duration,
    cache: Arc<RwLock<CacheEntry>>,
    client: reqwest::Client,
}

impl Customers {
    pub fn new(source: CustomerSource, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: Arc::new(RwLock::new(CacheEntry {
                names: HashSet::new(),
                fetched_at: None,
            })),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("default HTTP client builds"),
        }
    }

    /// Whether `identity` is in the allow-list, refreshing first if the
    /// cache has expired. Refresh failures are logged, never returned.
    pub async fn get(&self, identity: &str) -> bool {
        let needs_refresh = {
            let cache = self.cache.read().await;
            cache.expired(self.ttl)
        };

        if needs_refresh {
            if let Err(e) = self.fetch().await {
                warn!(error = %e, "customers refresh failed, serving stale allow-list");
            }
        }

        let cache = self.cache.read().await;
        cache.names.contains(&identity.trim().to_lowercase())
    }

    /// Load the full list from the source and atomically replace the set.
    pub async fn fetch(&self) -> Result<(), CustomersError> {
        let raw = match &self.source {
            CustomerSource::Url(url) => {
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| CustomersError::Request(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(CustomersError::Status {
                        url: url.to_string(),
                        status: response.status().as_u16(),
                    });
                }
                response
                    .text()
                    .await
                    .map_err(|e| CustomersError::Request(e.to_string()))?
            }
            CustomerSource::File(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| CustomersError::Io {
                        path: path.clone(),
                        source,
                    })?
            }
        };

        let names = parse_names(&raw);
        debug!(count = names.len(), "customers allow-list refreshed");

        let mut cache = self.cache.write().await;
        cache.names = names;
        cache.fetched_at = Some(Instant::now());
        Ok(())
    }
}

fn parse_names(raw: &str) -> HashSet<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_source(file: &NamedTempFile) -> CustomerSource {
        CustomerSource::File(file.path().to_string_lossy().into_owned())
    }

    fn write_names(file: &mut NamedTempFile, names: &str) {
        use std::io::Seek;
        file.as_file_mut().set_len(0).unwrap();
        file.as_file_mut().rewind().unwrap();
        file.write_all(names.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    #[test]
    fn parse_names_trims_lowercases_and_skips_blanks() {
        let names = parse_names("Alice\n  ACME  \n\nexample-org\n");
        assert!(names.contains("alice"));
        assert!(names.contains("acme"));
        assert!(names.contains("example-org"));
        assert_eq!(names.len(), 3);
    }

    #[tokio::test]
    async fn get_is_case_insensitive() {
        let mut file = NamedTempFile::new().unwrap();
        write_names(&mut file, "Alice\nacme\n");

        let customers = Customers::new(file_source(&file), Duration::from_secs(300));
        assert!(customers.get("alice").await);
        assert!(customers.get("ALICE").await);
        assert!(customers.get("Acme").await);
        assert!(!customers.get("mallory").await);
    }

    #[tokio::test]
    async fn lookups_within_ttl_do_not_refetch() {
        let mut file = NamedTempFile::new().unwrap();
        write_names(&mut file, "alice\n");

        let customers = Customers::new(file_source(&file), Duration::from_secs(300));
        assert!(customers.get("alice").await);

        // Source changes, but the cache is still fresh.
        write_names(&mut file, "bob\n");
        assert!(customers.get("alice").await);
        assert!(!customers.get("bob").await);
    }

    #[tokio::test]
    async fn expired_cache_picks_up_new_entries() {
        let mut file = NamedTempFile::new().unwrap();
        write_names(&mut file, "alice\n");

        // Zero TTL: every lookup refreshes.
        let customers = Customers::new(file_source(&file), Duration::ZERO);
        assert!(customers.get("alice").await);

        write_names(&mut file, "bob\n");
        assert!(customers.get("bob").await);
        assert!(!customers.get("alice").await);
    }

    #[tokio::test]
    async fn fetch_failure_serves_stale_contents() {
        let mut file = NamedTempFile::new().unwrap();
        write_names(&mut file, "alice\n");
        let path = file.path().to_string_lossy().into_owned();

        let customers = Customers::new(CustomerSource::File(path), Duration::ZERO);
        assert!(customers.get("alice").await);

        // Source disappears; the expired cache keeps serving the last
        // successful load.
        drop(file);
        assert!(customers.get("alice").await);
        assert!(!customers.get("bob").await);
    }

    #[tokio::test]
    async fn missing_source_starts_empty_not_erroring() {
        let customers = Customers::new(
            CustomerSource::File("/nonexistent/customers".to_string()),
            Duration::from_secs(300),
        );
        assert!(!customers.get("alice").await);
    }

    #[tokio::test]
    async fn fetch_reports_http_failure() {
        let app = axum::Router::new().route(
            "/customers",
            axum::routing::get(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "") }),
        );
        let base = crate::test_util::serve(app).await;
        let url = url::Url::parse(&format!("{base}/customers")).unwrap();

        let customers = Customers::new(CustomerSource::Url(url), Duration::from_secs(300));
        let err = customers.fetch().await.unwrap_err();
        assert!(matches!(err, CustomersError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn remote_source_is_fetched_over_http() {
        let app = axum::Router::new().route(
            "/customers",
            axum::routing::get(|| async { "alice\nacme\n" }),
        );
        let base = crate::test_util::serve(app).await;
        let url = url::Url::parse(&format!("{base}/customers")).unwrap();

        let customers = Customers::new(CustomerSource::Url(url), Duration::from_secs(300));
        assert!(customers.get("acme").await);
    }
}
