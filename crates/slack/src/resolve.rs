//! Identifier resolution: turns Slack user ids into display names.
//!
//! Lookups for distinct ids run concurrently. A failed lookup never fails the
//! batch; the id simply resolves to itself.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use {async_trait::async_trait, futures::future::join_all, tracing::debug};

use crate::error::Result;

/// Name fields of a user profile, in the shape the lookup returns them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub display_name_normalized: Option<String>,
    pub display_name: Option<String>,
    pub real_name: Option<String>,
    pub name: Option<String>,
}

impl UserProfile {
    /// First non-blank name by priority: normalized display name, display
    /// name, real name, account name.
    #[must_use]
    pub fn best_name(&self) -> Option<&str> {
        [
            &self.display_name_normalized,
            &self.display_name,
            &self.real_name,
            &self.name,
        ]
        .into_iter()
        .filter_map(|field| field.as_deref().map(str::trim))
        .find(|name| !name.is_empty())
    }
}

/// Single-profile lookup against the chat platform.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn user_profile(&self, user_id: &str) -> Result<UserProfile>;
}

/// Batch id → display-name resolution used by the normalization pipeline.
///
/// Implementations must return a non-empty name for every requested id.
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn resolve(&self, ids: &BTreeSet<String>) -> HashMap<String, String>;
}

/// Fixed mapping; ids missing from the map resolve to themselves.
#[async_trait]
impl NameResolver for HashMap<String, String> {
    async fn resolve(&self, ids: &BTreeSet<String>) -> HashMap<String, String> {
        ids.iter()
            .map(|id| {
                let name = self
                    .get(id)
                    .filter(|name| !name.trim().is_empty())
                    .cloned()
                    .unwrap_or_else(|| id.clone());
                (id.clone(), name)
            })
            .collect()
    }
}

/// Resolves ids through a [`ProfileLookup`], one lookup per distinct id.
pub struct IdentifierResolver {
    lookup: Arc<dyn ProfileLookup>,
}

impl IdentifierResolver {
    pub fn new(lookup: Arc<dyn ProfileLookup>) -> Self {
        Self { lookup }
    }

    async fn resolve_one(&self, id: &str) -> String {
        match self.lookup.user_profile(id).await {
            Ok(profile) => profile
                .best_name()
                .map(str::to_string)
                .unwrap_or_else(|| id.to_string()),
            Err(e) => {
                debug!(user_id = id, error = %e, "profile lookup failed, using raw id");
                id.to_string()
            },
        }
    }
}

#[async_trait]
impl NameResolver for IdentifierResolver {
    async fn resolve(&self, ids: &BTreeSet<String>) -> HashMap<String, String> {
        let lookups = ids.iter().map(|id| async move {
            let name = self.resolve_one(id).await;
            (id.clone(), name)
        });
        join_all(lookups).await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::error::Error,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    struct FakeLookup {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProfileLookup for FakeLookup {
        async fn user_profile(&self, user_id: &str) -> Result<UserProfile> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match user_id {
                "U1" => Ok(UserProfile {
                    display_name_normalized: Some("Ada".into()),
                    real_name: Some("Ada Lovelace".into()),
                    ..Default::default()
                }),
                "U2" => Ok(UserProfile {
                    display_name: Some("  ".into()),
                    real_name: Some("Grace Hopper".into()),
                    ..Default::default()
                }),
                "U3" => Ok(UserProfile::default()),
                _ => Err(Error::message("user_not_found")),
            }
        }
    }

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn best_name_follows_priority() {
        let profile = UserProfile {
            display_name: Some("disp".into()),
            real_name: Some("real".into()),
            name: Some("acct".into()),
            ..Default::default()
        };
        assert_eq!(profile.best_name(), Some("disp"));

        let profile = UserProfile {
            name: Some("acct".into()),
            ..Default::default()
        };
        assert_eq!(profile.best_name(), Some("acct"));
        assert_eq!(UserProfile::default().best_name(), None);
    }

    #[tokio::test]
    async fn resolves_each_distinct_id_once() {
        let lookup = Arc::new(FakeLookup {
            calls: AtomicUsize::new(0),
        });
        let resolver = IdentifierResolver::new(lookup.clone());

        let names = resolver.resolve(&ids(&["U1", "U2", "U3", "U9"])).await;

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 4);
        assert_eq!(names["U1"], "Ada");
        assert_eq!(names["U2"], "Grace Hopper");
        assert_eq!(names["U3"], "U3");
        assert_eq!(names["U9"], "U9");
    }

    #[tokio::test]
    async fn static_map_falls_back_to_id() {
        let map = HashMap::from([("U1".to_string(), "Ada".to_string())]);
        let names = map.resolve(&ids(&["U1", "U2"])).await;
        assert_eq!(names["U1"], "Ada");
        assert_eq!(names["U2"], "U2");
    }
}
