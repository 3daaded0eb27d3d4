//! Per-client record of endpoints that lost the default API.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

/// Set of endpoint URLs that proved they cannot serve the default API.
///
/// Clones share the same set. Entries are only ever added.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    downgraded: Arc<RwLock<HashSet<String>>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uses_full_api(&self, url: &str) -> bool {
        !self
            .downgraded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
    }

    /// Returns `true` if this call performed the downgrade.
    pub fn downgrade(&self, url: &str) -> bool {
        self.downgraded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string())
    }

    pub fn downgraded(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .downgraded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        urls.sort();
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let a = CapabilityRegistry::new();
        let b = a.clone();
        assert!(a.downgrade("https://old.example.com"));
        assert!(!b.uses_full_api("https://old.example.com"));
        assert!(b.uses_full_api("https://new.example.com"));
    }

    #[test]
    fn separate_registries_are_isolated() {
        let a = CapabilityRegistry::new();
        let b = CapabilityRegistry::new();
        a.downgrade("https://old.example.com");
        assert!(b.uses_full_api("https://old.example.com"));
    }

    #[test]
    fn concurrent_downgrades() {
        let registry = CapabilityRegistry::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let r = registry.clone();
                std::thread::spawn(move || {
                    r.downgrade(&format!("https://n{}.example.com", i % 4));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.downgraded().len(), 4);
    }
}
