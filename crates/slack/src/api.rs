//! Slack Web API calls needed by the bridge: profile lookups for mention
//! expansion and permalinks for the source message.

use std::time::Duration;

use {
    async_trait::async_trait,
    keeperlink_config::SlackConfig,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, de::DeserializeOwned},
    tracing::debug,
};

use crate::{
    error::{Context, Error, Result},
    resolve::{ProfileLookup, UserProfile},
};

#[derive(Debug, Deserialize)]
struct UsersInfoResponse {
    ok: bool,
    user: Option<SlackUser>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    name: Option<String>,
    real_name: Option<String>,
    #[serde(default)]
    profile: SlackUserProfile,
}

#[derive(Debug, Default, Deserialize)]
struct SlackUserProfile {
    display_name_normalized: Option<String>,
    display_name: Option<String>,
    real_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PermalinkResponse {
    ok: bool,
    permalink: Option<String>,
    error: Option<String>,
}

/// Minimal Slack Web API client authenticated with a bot token.
#[derive(Clone)]
pub struct SlackWebClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: Secret<String>,
}

impl SlackWebClient {
    pub fn new(api_base: &str, bot_token: Secret<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("keeperlink/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token,
        })
    }

    /// Build a client from config, or `None` when no bot token is configured.
    pub fn from_config(config: &SlackConfig) -> Result<Option<Self>> {
        let Some(token) = config.bot_token.clone() else {
            return Ok(None);
        };
        Self::new(
            &config.api_base,
            token,
            Duration::from_secs(config.request_timeout_secs.max(1)),
        )
        .map(Some)
    }

    /// Permanent link to a message, used to reference the source in tasks.
    pub async fn permalink(&self, channel: &str, message_ts: &str) -> Result<String> {
        let response: PermalinkResponse = self
            .get("chat.getPermalink", &[
                ("channel", channel),
                ("message_ts", message_ts),
            ])
            .await?;
        if !response.ok {
            return Err(api_error("chat.getPermalink", response.error));
        }
        response
            .permalink
            .filter(|link| !link.trim().is_empty())
            .context("slack chat.getPermalink did not return a permalink")
    }

    async fn get<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> Result<T> {
        let resp = self
            .http
            .get(format!("{}/{method}", self.api_base))
            .bearer_auth(self.bot_token.expose_secret())
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited {
                method: method.to_string(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                method: method.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }
}

fn api_error(method: &str, code: Option<String>) -> Error {
    Error::Api {
        method: method.to_string(),
        code: code.unwrap_or_else(|| "unknown_error".to_string()),
    }
}

#[async_trait]
impl ProfileLookup for SlackWebClient {
    async fn user_profile(&self, user_id: &str) -> Result<UserProfile> {
        let response: UsersInfoResponse = self.get("users.info", &[("user", user_id)]).await?;
        if !response.ok {
            return Err(api_error("users.info", response.error));
        }
        let user = response
            .user
            .context("slack users.info response missing user")?;
        debug!(user_id, "fetched slack profile");
        Ok(UserProfile {
            display_name_normalized: user.profile.display_name_normalized,
            display_name: user.profile.display_name,
            real_name: user.real_name.or(user.profile.real_name),
            name: user.name,
        })
    }
}
