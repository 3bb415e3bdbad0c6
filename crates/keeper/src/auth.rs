//! Client-credentials token cache for the Keeper API.
//!
//! One token slot per [`CredentialCache`]. Callers that miss the cache at the
//! same time each run an exchange and the last response wins; exchanges are
//! idempotent so this only costs an extra request.

use std::time::{Duration, Instant};

use {
    keeperlink_config::KeeperConfig,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tokio::sync::Mutex,
    tracing::{debug, info},
};

use crate::error::{Error, Result};

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TTL_SECS: u64 = 3600;

#[derive(Clone)]
pub struct CachedAccessToken {
    pub token: Secret<String>,
    /// `None` when the advertised lifetime does not fit in an `Instant`.
    pub expires_at: Option<Instant>,
}

impl CachedAccessToken {
    /// A margin too large to add to now counts as already expired.
    fn is_valid(&self, safety_margin: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(safety_margin) else {
            return false;
        };
        self.expires_at.is_none_or(|expires_at| deadline < expires_at)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

pub struct CredentialCache {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: Secret<String>,
    safety_margin: Duration,
    slot: Mutex<Option<CachedAccessToken>>,
}

impl CredentialCache {
    pub fn new(http: reqwest::Client, config: &KeeperConfig) -> Self {
        Self {
            http,
            token_url: config.token_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            safety_margin: Duration::from_secs(config.token_safety_margin_secs),
            slot: Mutex::new(None),
        }
    }

    /// Return the cached token, or exchange credentials for a new one when
    /// the cached token is missing or inside its safety margin.
    pub async fn get_token(&self) -> Result<Secret<String>> {
        {
            let guard = self.slot.lock().await;
            if let Some(token) = guard.as_ref()
                && token.is_valid(self.safety_margin)
            {
                return Ok(token.token.clone());
            }
        }

        let cached = self.exchange().await?;
        let token = cached.token.clone();

        let mut guard = self.slot.lock().await;
        *guard = Some(cached);
        Ok(token)
    }

    /// Drop the cached token so the next call performs a fresh exchange.
    pub async fn invalidate(&self) {
        let mut guard = self.slot.lock().await;
        if guard.take().is_some() {
            debug!("keeper token invalidated");
        }
    }

    async fn exchange(&self) -> Result<CachedAccessToken> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret().as_str()),
        ];

        let resp = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(Error::credential_exchange)?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::credential_exchange(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let body: TokenResponse = resp.json().await.map_err(Error::credential_exchange)?;
        let ttl = body.expires_in.unwrap_or(DEFAULT_TTL_SECS);
        info!(ttl_secs = ttl, "obtained keeper access token");

        Ok(CachedAccessToken {
            token: Secret::new(body.access_token),
            expires_at: Instant::now().checked_add(Duration::from_secs(ttl)),
        })
    }
}
