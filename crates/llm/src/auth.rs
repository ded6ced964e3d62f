//! Bearer token providers for Google Cloud (Vertex AI).
//!
//! `ServiceAccountTokenProvider` implements the OAuth 2.0 JWT bearer grant:
//! it signs an RS256 assertion with the service account's private key and
//! exchanges it at the token endpoint. Tokens are cached until shortly
//! before they expire.

use crate::provider::{LlmError, ServiceFuture};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
/// Refresh this many seconds before the reported expiry.
const EXPIRY_SAFETY_WINDOW: i64 = 300;
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Source of `Authorization: Bearer <token>` values.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> ServiceFuture<'_, String>;
}

/// Always hands out the same token. Useful for tests and externally managed tokens.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn token(&self) -> ServiceFuture<'_, String> {
        let token = self.token.clone();
        Box::pin(async move { Ok(token) })
    }
}

/// Subset of a service account key file needed for the JWT flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, LlmError> {
        serde_json::from_str(json)
            .map_err(|e| LlmError::Configuration(format!("invalid service account JSON: {e}")))
    }

    /// Read and parse a key file from disk.
    pub fn from_file(path: &Path) -> Result<Self, LlmError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            LlmError::Configuration(format!("cannot read key file {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    token: String,
    exp_unix: i64,
}

pub struct ServiceAccountTokenProvider {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    client: reqwest::Client,
    // Held across the refresh so concurrent callers wait for a single fetch.
    cache: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenProvider {
    /// Fails if the private key is not a valid RSA PEM.
    pub fn new(key: ServiceAccountKey, client: reqwest::Client) -> Result<Self, LlmError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| LlmError::Configuration(format!("invalid RSA private key: {e}")))?;
        Ok(Self {
            key,
            encoding_key,
            client,
            cache: Mutex::new(None),
        })
    }

    fn sign_assertion(&self, now: i64) -> Result<String, LlmError> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: DEFAULT_SCOPE,
            aud: self.key.token_uri(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_owned());
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| LlmError::Configuration(format!("failed to sign JWT: {e}")))
    }

    async fn fetch(&self) -> Result<CachedToken, LlmError> {
        let now = chrono::Utc::now().timestamp();
        let assertion = self.sign_assertion(now)?;
        let form = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ];

        let resp = self.client
            .post(self.key.token_uri())
            .form(&form)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(format!("token endpoint: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Authentication(format!("token endpoint {status}: {body}")));
        }

        let tr: TokenResponse = resp.json().await
            .map_err(|e| LlmError::InvalidResponse(format!("token response: {e}")))?;

        tracing::debug!(client = %self.key.client_email, expires_in = tr.expires_in, "fetched access token");
        Ok(CachedToken { token: tr.access_token, exp_unix: now + tr.expires_in })
    }
}

impl TokenProvider for ServiceAccountTokenProvider {
    fn token(&self) -> ServiceFuture<'_, String> {
        Box::pin(async move {
            let mut cache = self.cache.lock().await;
            let now = chrono::Utc::now().timestamp();
            if let Some(cached) = cache.as_ref()
                && cached.exp_unix - EXPIRY_SAFETY_WINDOW > now
            {
                return Ok(cached.token.clone());
            }
            let fresh = self.fetch().await?;
            let token = fresh.token.clone();
            *cache = Some(fresh);
            Ok(token)
        })
    }
}
