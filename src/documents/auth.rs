//! Google Service-Account Authentication
//!
//! Signs an RS256 JWT assertion with the service-account key and exchanges it at
//! the token endpoint for a bearer token. Tokens are cached until shortly before
//! they expire.

use super::DocumentError;
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

/// OAuth scopes needed for Drive copy/export/permissions and Sheets append
pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/spreadsheets",
];

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Assertion lifetime (Google caps this at one hour)
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh this long before the reported expiry
const EXPIRY_SKEW_SECS: i64 = 60;

/// The fields of a service-account JSON key that we use
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(raw)
            .map_err(|e| DocumentError::Auth(format!("invalid service account JSON: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self, DocumentError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DocumentError::Auth(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    /// Accept either inline JSON or a path to a key file
    pub fn load(value: &str) -> Result<Self, DocumentError> {
        let trimmed = value.trim();
        if trimmed.starts_with('{') {
            Self::from_json(trimmed)
        } else {
            Self::from_file(Path::new(trimmed))
        }
    }
}

/// Source of bearer tokens for Google API calls
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, DocumentError>;
}

/// Fixed token, for tests and pre-provisioned credentials
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, DocumentError> {
        Ok(self.0.clone())
    }
}

/// JWT assertion claims
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: i64,
}

/// Service-account token provider
pub struct ServiceAccountTokens {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scopes: String,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokens {
    pub fn new(key: ServiceAccountKey) -> Result<Self, DocumentError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| DocumentError::Auth(format!("invalid private key: {}", e)))?;

        Ok(Self {
            key,
            encoding_key,
            scopes: DEFAULT_SCOPES.join(" "),
            client: reqwest::Client::new(),
            cached: Mutex::new(None),
        })
    }

    fn assertion(&self, now: i64) -> Result<String, DocumentError> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: self.scopes.clone(),
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| DocumentError::Auth(format!("failed to sign assertion: {}", e)))
    }

    async fn exchange(&self, now: i64) -> Result<CachedToken, DocumentError> {
        let assertion = self.assertion(now)?;
        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ];

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| DocumentError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DocumentError::Auth(format!(
                "token exchange failed ({}): {}",
                status, error_text
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DocumentError::Malformed(e.to_string()))?;

        Ok(CachedToken {
            token: token.access_token,
            expires_at: now + token.expires_in,
        })
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokens {
    async fn access_token(&self) -> Result<String, DocumentError> {
        let now = Utc::now().timestamp();
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at - EXPIRY_SKEW_SECS > now {
                return Ok(token.token.clone());
            }
        }

        debug!("Refreshing Google access token for {}", self.key.client_email);
        let fresh = self.exchange(now).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}
