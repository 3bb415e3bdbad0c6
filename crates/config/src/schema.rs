/// Config schema types (slack, keeper, directory, tasks).
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeeperlinkConfig {
    pub slack: SlackConfig,
    pub keeper: KeeperConfig,
    pub directory: DirectoryConfig,
    pub tasks: TasksConfig,
}

/// Slack Web API access used for mention lookups and permalinks.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`). Without it mentions fall back to raw ids.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_secret"
    )]
    pub bot_token: Option<Secret<String>>,
    /// Web API base URL. Defaults to `https://slack.com/api`.
    pub api_base: String,
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: "https://slack.com/api".into(),
            request_timeout_secs: 10,
        }
    }
}

/// Keeper API endpoint and client-credentials settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
    /// API base URL. Defaults to `https://api.keeper.app`.
    pub api_base: String,
    /// Token endpoint. Defaults to `{api_base}/oauth/token`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_url: Option<String>,
    pub client_id: String,
    #[serde(serialize_with = "serialize_secret")]
    pub client_secret: Secret<String>,
    /// Seconds before expiry at which a cached token stops being reused.
    pub token_safety_margin_secs: u64,
    pub request_timeout_secs: u64,
}

impl KeeperConfig {
    /// Token endpoint, falling back to `{api_base}/oauth/token`.
    #[must_use]
    pub fn token_url(&self) -> String {
        match self.oauth_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!("{}/oauth/token", self.api_base.trim_end_matches('/')),
        }
    }
}

impl std::fmt::Debug for KeeperConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeeperConfig")
            .field("api_base", &self.api_base)
            .field("oauth_url", &self.oauth_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("token_safety_margin_secs", &self.token_safety_margin_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.keeper.app".into(),
            oauth_url: None,
            client_id: String::new(),
            client_secret: Secret::new(String::new()),
            token_safety_margin_secs: 60,
            request_timeout_secs: 30,
        }
    }
}

/// Client directory listing, caching and search limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub clients_path: String,
    pub users_path: String,
    /// Records requested per page (`limit`). Defaults to 100.
    pub page_size: usize,
    /// Background refresh period. Defaults to 30 minutes.
    pub refresh_interval_secs: u64,
    /// Maximum matches returned for a non-empty query.
    pub search_limit: usize,
    /// Entries returned for an empty query.
    pub empty_query_limit: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            clients_path: "/api/clients/summary".into(),
            users_path: "/api/users".into(),
            page_size: 100,
            refresh_interval_secs: 30 * 60,
            search_limit: 100,
            empty_query_limit: 50,
        }
    }
}

/// Task creation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    pub create_path: String,
    pub title_max_chars: usize,
    /// Used when both title and description are blank.
    pub default_title: String,
    /// Ordered ways of attaching a description to a created task. The first
    /// attempt that succeeds wins.
    pub attach_strategies: Vec<AttachStrategy>,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            create_path: "/api/non-closing-tasks".into(),
            title_max_chars: 255,
            default_title: "Task from Slack".into(),
            attach_strategies: default_attach_strategies(),
        }
    }
}

/// One candidate request for persisting a task description.
///
/// `path` may contain `{id}`, replaced with the created task id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttachStrategy {
    /// `PATCH path` with `{ field: text }`.
    FieldUpdate { path: String, field: String },
    /// `POST path` with `{ text_field: text }`.
    NestedNote { path: String, text_field: String },
    /// `POST path` with `{ id_field: id, text_field: text }`.
    FlatNote {
        path: String,
        id_field: String,
        text_field: String,
    },
}

/// Default attach order: direct field updates first, then note endpoints.
#[must_use]
pub fn default_attach_strategies() -> Vec<AttachStrategy> {
    let task_path = "/api/non-closing-tasks/{id}";
    vec![
        AttachStrategy::FieldUpdate {
            path: task_path.into(),
            field: "description".into(),
        },
        AttachStrategy::FieldUpdate {
            path: task_path.into(),
            field: "subText".into(),
        },
        AttachStrategy::FieldUpdate {
            path: task_path.into(),
            field: "notes".into(),
        },
        AttachStrategy::NestedNote {
            path: "/api/non-closing-tasks/{id}/notes".into(),
            text_field: "text".into(),
        },
        AttachStrategy::FlatNote {
            path: "/api/notes".into(),
            id_field: "taskId".into(),
            text_field: "text".into(),
        },
    ]
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_url_defaults_under_api_base() {
        let cfg = KeeperConfig {
            api_base: "https://keeper.example/".into(),
            ..Default::default()
        };
        assert_eq!(cfg.token_url(), "https://keeper.example/oauth/token");

        let cfg = KeeperConfig {
            oauth_url: Some("https://auth.example/token".into()),
            ..cfg
        };
        assert_eq!(cfg.token_url(), "https://auth.example/token");
    }

    #[test]
    fn attach_strategies_parse_from_toml() {
        let raw = r#"
            [[attach_strategies]]
            kind = "field_update"
            path = "/api/tasks/{id}"
            field = "body"

            [[attach_strategies]]
            kind = "flat_note"
            path = "/api/notes"
            id_field = "task_id"
            text_field = "note"
        "#;
        let cfg: TasksConfig = toml::from_str(raw).unwrap();
        assert_eq!(cfg.attach_strategies.len(), 2);
        assert_eq!(cfg.attach_strategies[1], AttachStrategy::FlatNote {
            path: "/api/notes".into(),
            id_field: "task_id".into(),
            text_field: "note".into(),
        });
        assert_eq!(cfg.title_max_chars, 255);
    }

    #[test]
    fn debug_redacts_secrets() {
        let cfg = KeeperConfig {
            client_secret: Secret::new("hunter2".into()),
            ..Default::default()
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
