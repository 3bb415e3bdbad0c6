use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::KeeperlinkConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "keeperlink.toml",
    "keeperlink.yaml",
    "keeperlink.yml",
    "keeperlink.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<KeeperlinkConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply environment
/// overrides.
///
/// Search order:
/// 1. `./keeperlink.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/keeperlink/keeperlink.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `KeeperlinkConfig::default()` if no config file is found.
pub fn discover_and_load() -> KeeperlinkConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            match load_config(&path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                    KeeperlinkConfig::default()
                },
            }
        },
        None => {
            debug!("no config file found, using defaults");
            KeeperlinkConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

/// Overlay the deployment environment variables on top of file config.
pub fn apply_env_overrides(config: &mut KeeperlinkConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(
    config: &mut KeeperlinkConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(base) = get("KEEPER_API_BASE").or_else(|| get("KEEPER_BASE_URL")) {
        config.keeper.api_base = base;
    }
    if let Some(url) = get("KEEPER_OAUTH_URL") {
        config.keeper.oauth_url = Some(url);
    }
    if let Some(id) = get("KEEPER_CLIENT_ID") {
        config.keeper.client_id = id;
    }
    if let Some(secret) = get("KEEPER_CLIENT_SECRET") {
        config.keeper.client_secret = Secret::new(secret);
    }
    if let Some(token) = get("SLACK_BOT_TOKEN") {
        config.slack.bot_token = Some(Secret::new(token));
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/keeperlink/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "keeperlink").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<KeeperlinkConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
