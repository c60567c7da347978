//! OAuth token lifecycle for the Zoom server-to-server app.
//!
//! Tokens are cached for their advertised lifetime minus a five-minute
//! safety buffer. The cache is bypassed on force refresh and is never
//! populated from a failed exchange, so a bad response cannot poison
//! later requests.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::ZoomApiError;
use crate::config::{OAuthGrant, ZoomConfig};

const EXPIRY_SAFETY_BUFFER_SECS: i64 = 300;
const TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// A freshly exchanged token with its advertised lifetime.
#[derive(Debug, Clone)]
pub struct FetchedToken {
    pub access_token: String,
    pub expires_in: i64,
    pub scope: Option<String>,
}

/// Performs the actual credential exchange. Split out so the cache logic is
/// testable without a network.
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    async fn fetch(&self) -> Result<FetchedToken, ZoomApiError>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at_ms: i64,
}

/// Caching wrapper around a [`TokenFetcher`].
pub struct TokenManager {
    fetcher: Box<dyn TokenFetcher>,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(fetcher: impl TokenFetcher + 'static) -> Self {
        Self {
            fetcher: Box::new(fetcher),
            cache: Mutex::new(None),
        }
    }

    /// Returns a bearer token, reusing the cached value while it is still
    /// inside its safety window. `force_refresh` always exchanges anew.
    pub async fn access_token(&self, force_refresh: bool) -> Result<String, ZoomApiError> {
        let mut cache = self.cache.lock().await;

        if !force_refresh {
            if let Some(cached) = cache.as_ref() {
                if Utc::now().timestamp_millis() < cached.expires_at_ms {
                    debug!("Using cached access token ({} chars)", cached.value.len());
                    return Ok(cached.value.clone());
                }
            }
        }

        let fetched = self.fetcher.fetch().await?;
        let expires_at_ms = Utc::now().timestamp_millis()
            + (fetched.expires_in - EXPIRY_SAFETY_BUFFER_SECS) * 1000;

        // Never log the token itself; length and scope are enough to debug.
        info!(
            "Obtained access token ({} chars, scope: {})",
            fetched.access_token.len(),
            fetched.scope.as_deref().unwrap_or("unknown")
        );

        *cache = Some(CachedToken {
            value: fetched.access_token.clone(),
            expires_at_ms,
        });

        Ok(fetched.access_token)
    }
}

/// Real fetcher: POSTs a form-encoded grant to the Zoom token endpoint with
/// Basic client authentication.
pub struct OAuthTokenFetcher {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    grant: OAuthGrant,
    account_id: Option<String>,
}

impl OAuthTokenFetcher {
    pub fn new(config: &ZoomConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: config.oauth_token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            grant: config.grant,
            account_id: config.account_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    scope: Option<String>,
}

#[async_trait]
impl TokenFetcher for OAuthTokenFetcher {
    async fn fetch(&self) -> Result<FetchedToken, ZoomApiError> {
        let form: Vec<(&str, String)> = match self.grant {
            OAuthGrant::AccountCredentials => {
                let account_id = self
                    .account_id
                    .clone()
                    .ok_or(ZoomApiError::MissingCredential(
                        "ZOOM_ACCOUNT_ID is required for the account_credentials grant",
                    ))?;
                vec![
                    ("grant_type", "account_credentials".to_string()),
                    ("account_id", account_id),
                ]
            }
            OAuthGrant::ClientCredentials => {
                vec![("grant_type", "client_credentials".to_string())]
            }
        };

        let basic = BASE64.encode(format!("{}:{}", self.client_id, self.client_secret));

        let resp = self
            .http
            .post(&self.token_url)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {basic}"))
            .form(&form)
            .timeout(TOKEN_TIMEOUT)
            .send()
            .await
            .inspect_err(|e| error!(error = %e, "Token endpoint unreachable"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ZoomApiError::Api { status, message });
        }

        let body = resp.text().await?;
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| ZoomApiError::Malformed(format!("token response: {e}")))?;

        Ok(FetchedToken {
            access_token: token.access_token,
            expires_in: token.expires_in,
            scope: token.scope,
        })
    }
}
