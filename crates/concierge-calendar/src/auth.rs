//! Service-account authentication (OAuth 2.0 JWT bearer grant).

use crate::config::CalendarConfig;
use crate::error::CalendarError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::sync::Mutex;

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Cached tokens are replaced this long before they expire.
const REFRESH_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_expires_in() -> i64 {
    3600
}

/// The fields of a Google service account key file that signing needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, CalendarError> {
        serde_json::from_str(json).map_err(|e| CalendarError::Credentials(e.to_string()))
    }

    /// Reads the key file if it exists, otherwise the inline JSON.
    pub fn load(config: &CalendarConfig) -> Result<Self, CalendarError> {
        let path = Path::new(&config.credentials_file);
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| CalendarError::Credentials(format!("{}: {e}", path.display())))?;
            return Self::from_json(&contents);
        }
        match &config.service_account_json {
            Some(json) => Self::from_json(json),
            None => Err(CalendarError::CredentialsMissing),
        }
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Hands out access tokens, exchanging a fresh assertion only when the
/// cached token is about to expire.
pub struct TokenProvider {
    key: ServiceAccountKey,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenProvider")
            .field("client_email", &self.key.client_email)
            .finish_non_exhaustive()
    }
}

impl TokenProvider {
    pub fn new(key: ServiceAccountKey, http: reqwest::Client) -> Self {
        Self {
            key,
            http,
            cached: Mutex::new(None),
        }
    }

    pub async fn access_token(&self) -> Result<String, CalendarError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > Utc::now() {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.exchange().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String, CalendarError> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: CALENDAR_SCOPE,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &key,
        )?)
    }

    async fn exchange(&self) -> Result<CachedToken, CalendarError> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CalendarError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = response.json().await?;
        tracing::info!(
            client = %self.key.client_email,
            expires_in = token.expires_in,
            "Google Calendar service authenticated"
        );
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}
