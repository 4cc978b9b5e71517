//! License feature values delivered with the lease.

use std::sync::{Arc, RwLock};

use crate::transport::FeatureMap;

/// Snapshot cache of the feature values of the current lease.
///
/// The whole map is swapped at once, so a reader never sees keys from two
/// different grants.
#[derive(Debug, Default)]
pub struct FeatureStore {
    snapshot: RwLock<Arc<FeatureMap>>,
}

impl FeatureStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a feature, or an empty string if absent.
    pub fn get(&self, name: &str) -> String {
        self.snapshot().get(name).cloned().unwrap_or_default()
    }

    /// Whether the feature has a non-empty value.
    pub fn has(&self, name: &str) -> bool {
        !self.get(name).is_empty()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<FeatureMap> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Replace every value with a new snapshot.
    pub fn replace(&self, features: FeatureMap) {
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(features);
    }

    /// Forget every value.
    pub fn clear(&self) {
        self.replace(FeatureMap::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> FeatureMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_unknown_feature_is_empty() {
        let store = FeatureStore::new();
        assert_eq!(store.get("unknown"), "");
        assert!(!store.has("unknown"));
    }

    #[test]
    fn test_empty_value_is_not_entitled() {
        let store = FeatureStore::new();
        store.replace(map(&[("seats", ""), ("edition", "pro")]));
        assert!(!store.has("seats"));
        assert!(store.has("edition"));
    }

    #[test]
    fn test_replace_drops_old_keys() {
        let store = FeatureStore::new();
        store.replace(map(&[("a", "1"), ("b", "2")]));
        let before = store.snapshot();

        store.replace(map(&[("b", "3"), ("c", "4")]));
        assert_eq!(store.get("a"), "");
        assert_eq!(store.get("b"), "3");
        assert_eq!(store.get("c"), "4");

        // An old snapshot stays internally consistent.
        assert_eq!(before.get("a").map(String::as_str), Some("1"));
        assert_eq!(before.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_clear() {
        let store = FeatureStore::new();
        store.replace(map(&[("a", "1")]));
        store.clear();
        assert!(store.snapshot().is_empty());
    }
}
