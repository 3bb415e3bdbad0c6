//! Configuration loading, validation and env substitution.
//!
//! Config files: `keeperlink.toml`, `keeperlink.yaml`, or `keeperlink.json`
//! Searched in `./` then `~/.config/keeperlink/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values. The deployment
//! variables (`KEEPER_CLIENT_ID`, `SLACK_BOT_TOKEN`, ...) override file values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{
        AttachStrategy, DirectoryConfig, KeeperConfig, KeeperlinkConfig, SlackConfig,
        TasksConfig, default_attach_strategies,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
