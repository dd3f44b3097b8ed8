//! Entra ID client-credentials token acquisition.
//!
//! Tokens are cached and reused until shortly before they expire.

use std::time::Duration;

use chatrelay_types::error::RuntimeError;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::FoundrySettings;

/// Scope requested for the agent runtime.
pub const AGENTS_SCOPE: &str = "https://ai.azure.com/.default";

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(300);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    token: SecretString,
    refresh_at: Instant,
}

/// Client-credentials token source with an in-memory cache.
pub struct ClientSecretCredential {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientSecretCredential {
    pub fn new(client: reqwest::Client, settings: &FoundrySettings) -> Self {
        Self {
            client,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                settings.authority_host.trim_end_matches('/'),
                settings.tenant_id
            ),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            scope: AGENTS_SCOPE.to_string(),
            cached: Mutex::new(None),
        }
    }

    /// A valid bearer token, fetched only when the cached one is stale.
    pub async fn token(&self) -> Result<SecretString, RuntimeError> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if Instant::now() < entry.refresh_at {
                return Ok(entry.token.clone());
            }
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn fetch(&self) -> Result<CachedToken, RuntimeError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| RuntimeError::Transport(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Outages and throttling on the token endpoint heal on their own;
            // other client errors mean the credentials are wrong.
            if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                return Err(RuntimeError::Http {
                    status: status.as_u16(),
                    message: format!("token endpoint: {body}"),
                });
            }
            return Err(RuntimeError::Authentication(format!("HTTP {status}: {body}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| RuntimeError::Authentication(format!("invalid token response: {e}")))?;

        let lifetime = Duration::from_secs(body.expires_in);
        debug!(expires_in = body.expires_in, "acquired access token");
        Ok(CachedToken {
            token: SecretString::from(body.access_token),
            refresh_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        })
    }
}
