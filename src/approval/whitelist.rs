//! Trust Whitelist
//!
//! The set of command roots the user has chosen to "always allow" for the
//! lifetime of one tool instance. Owned by the instance and shared by handle
//! with the confirmation gate; never persisted.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

/// Instance-owned set of trusted command roots
///
/// Cloning yields another handle to the same set. Entries are only ever
/// added, so membership is monotonic for the life of the set.
#[derive(Debug, Clone, Default)]
pub struct TrustWhitelist {
    roots: Arc<RwLock<HashSet<String>>>,
}

impl TrustWhitelist {
    /// Create an empty whitelist
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `root` has been trusted
    pub fn contains(&self, root: &str) -> bool {
        self.roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(root)
    }

    /// Trust `root`; returns false if it was already trusted
    pub fn insert(&self, root: impl Into<String>) -> bool {
        let mut roots = self.roots.write().unwrap_or_else(PoisonError::into_inner);
        let added = roots.insert(root.into());
        crate::metrics::TRUSTED_ROOTS.set(i64::try_from(roots.len()).unwrap_or(i64::MAX));
        added
    }

    /// Trusted roots, sorted
    pub fn roots(&self) -> Vec<String> {
        let mut roots: Vec<String> = self
            .roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        roots.sort();
        roots
    }

    /// Number of trusted roots
    pub fn len(&self) -> usize {
        self.roots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let whitelist = TrustWhitelist::new();
        assert!(whitelist.is_empty());
        assert!(!whitelist.contains("ls"));
    }

    #[test]
    fn test_insert_and_contains() {
        let whitelist = TrustWhitelist::new();
        assert!(whitelist.insert("git"));
        assert!(!whitelist.insert("git"));
        assert!(whitelist.contains("git"));
        assert_eq!(whitelist.len(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let whitelist = TrustWhitelist::new();
        let handle = whitelist.clone();
        handle.insert("npm");
        handle.insert("cargo");

        assert!(whitelist.contains("npm"));
        assert_eq!(whitelist.roots(), vec!["cargo".to_string(), "npm".to_string()]);
    }

    #[test]
    fn test_separate_instances_are_independent() {
        let a = TrustWhitelist::new();
        let b = TrustWhitelist::new();
        a.insert("rm");
        assert!(!b.contains("rm"));
    }
}
