//! Slack side of keeperlink: message text normalization and the Web API
//! lookups it needs (user profiles for mentions, message permalinks).

pub mod api;
pub mod error;
pub mod mentions;
pub mod normalize;
pub mod resolve;

pub use {
    api::SlackWebClient,
    error::{Error, Result},
    mentions::{MentionKind, MentionToken, extract_mentions},
    normalize::{append_permalink, normalize},
    resolve::{IdentifierResolver, NameResolver, ProfileLookup, UserProfile},
};

/// Compile a pattern literal. Only called from `LazyLock` statics with
/// patterns covered by unit tests.
#[allow(clippy::expect_used)]
pub(crate) fn compile(pattern: &str) -> regex::Regex {
    regex::Regex::new(pattern).expect("static regex pattern must compile")
}
