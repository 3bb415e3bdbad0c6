//! Semantic validation of a loaded configuration.
//!
//! Parsing already rejects malformed files; this pass reports settings that
//! parse fine but cannot work at runtime (missing credentials, zero limits).

use secrecy::ExposeSecret;

use crate::schema::{AttachStrategy, KeeperlinkConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "directory.page_size"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Check a configuration for values that would fail at runtime.
#[must_use]
pub fn validate(config: &KeeperlinkConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if config.keeper.client_id.trim().is_empty() {
        result.push(
            Severity::Error,
            "keeper.client_id",
            "missing client id (set KEEPER_CLIENT_ID)",
        );
    }
    if config.keeper.client_secret.expose_secret().trim().is_empty() {
        result.push(
            Severity::Error,
            "keeper.client_secret",
            "missing client secret (set KEEPER_CLIENT_SECRET)",
        );
    }
    if url::Url::parse(&config.keeper.api_base).is_err() {
        result.push(
            Severity::Error,
            "keeper.api_base",
            format!("not a valid URL: {}", config.keeper.api_base),
        );
    }
    if config.slack.bot_token.is_none() {
        result.push(
            Severity::Warning,
            "slack.bot_token",
            "no bot token: mentions will render as raw ids",
        );
    }
    if config.directory.page_size == 0 {
        result.push(
            Severity::Error,
            "directory.page_size",
            "page size must be at least 1",
        );
    }
    if config.directory.refresh_interval_secs == 0 {
        result.push(
            Severity::Error,
            "directory.refresh_interval_secs",
            "refresh interval must be at least 1 second",
        );
    }
    if config.tasks.title_max_chars == 0 {
        result.push(
            Severity::Error,
            "tasks.title_max_chars",
            "title limit must be at least 1",
        );
    }
    if config.tasks.attach_strategies.is_empty() {
        result.push(
            Severity::Warning,
            "tasks.attach_strategies",
            "no attach strategies: descriptions will never be stored",
        );
    }
    for (idx, strategy) in config.tasks.attach_strategies.iter().enumerate() {
        let path = match strategy {
            AttachStrategy::FieldUpdate { path, .. }
            | AttachStrategy::NestedNote { path, .. }
            | AttachStrategy::FlatNote { path, .. } => path,
        };
        if !path.starts_with('/') {
            result.push(
                Severity::Error,
                &format!("tasks.attach_strategies[{idx}].path"),
                format!("path must start with '/': {path}"),
            );
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use {super::*, secrecy::Secret};

    fn configured() -> KeeperlinkConfig {
        let mut cfg = KeeperlinkConfig::default();
        cfg.keeper.client_id = "cid".into();
        cfg.keeper.client_secret = Secret::new("secret".into());
        cfg.slack.bot_token = Some(Secret::new("xoxb".into()));
        cfg
    }

    #[test]
    fn defaults_with_credentials_are_clean() {
        let result = validate(&configured());
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn missing_credentials_are_errors() {
        let result = validate(&KeeperlinkConfig::default());
        assert!(result.has_errors());
        assert_eq!(result.count(Severity::Error), 2);
        assert_eq!(result.count(Severity::Warning), 1);
    }

    #[test]
    fn relative_attach_path_is_reported() {
        let mut cfg = configured();
        cfg.tasks.attach_strategies = vec![AttachStrategy::NestedNote {
            path: "api/notes".into(),
            text_field: "text".into(),
        }];
        let result = validate(&cfg);
        assert!(result.has_errors());
        assert_eq!(
            result.diagnostics[0].path,
            "tasks.attach_strategies[0].path"
        );
    }

    #[test]
    fn zero_page_size_is_reported() {
        let mut cfg = configured();
        cfg.directory.page_size = 0;
        let result = validate(&cfg);
        assert_eq!(result.count(Severity::Error), 1);
        assert!(result.diagnostics[0].to_string().contains("page_size"));
    }
}
