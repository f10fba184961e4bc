// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ES256 signing and verification of session tokens.

use std::fs;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use super::claims::SessionClaims;
use crate::config::ConfigError;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Token verification failure. The variants matter for logging; callers
/// treat every one of them as "unauthorized".
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token claims rejected: {0}")]
    InvalidClaims(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Issues and verifies session tokens.
///
/// Keys are parsed once at construction; a bad or missing key file refuses
/// startup instead of failing per request.
#[derive(Debug)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    audience: String,
}

impl TokenService {
    pub fn from_key_files(
        private_key_path: &str,
        public_key_path: &str,
        audience: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let private_pem = read_key(private_key_path)?;
        let public_pem = read_key(public_key_path)?;
        Self::from_pem(&private_pem, &public_pem, audience).map_err(|source| ConfigError::Key {
            path: private_key_path.to_string(),
            source,
        })
    }

    pub fn from_pem(
        private_pem: &[u8],
        public_pem: &[u8],
        audience: impl Into<String>,
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self {
            encoding: EncodingKey::from_ec_pem(private_pem)?,
            decoding: DecodingKey::from_ec_pem(public_pem)?,
            audience: audience.into(),
        })
    }

    /// Sign `claims` with the private key.
    pub fn sign(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::ES256), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature, expiry, and audience; returns the claims on success.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::ES256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_audience(&[&self.audience]);

        let data = decode::<SessionClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                jsonwebtoken::errors::ErrorKind::InvalidAudience
                | jsonwebtoken::errors::ErrorKind::InvalidIssuer
                | jsonwebtoken::errors::ErrorKind::ImmatureSignature => {
                    TokenError::InvalidClaims(e.to_string())
                }
                _ => TokenError::Malformed,
            }
        })?;
        Ok(data.claims)
    }
}

fn read_key(path: &str) -> Result<Vec<u8>, ConfigError> {
    fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })
}
