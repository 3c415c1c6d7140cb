// Publisher key → adapter resolution. The map is built once at startup from
// the full adapter set so a wiring mistake fails at boot, not at the first
// collection run.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CollectError, Result};
use crate::http::Http;
use crate::sources::{build_adapters, SourceAdapter};

pub struct SourceRegistry {
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new(http: &Http) -> Self {
        Self::from_adapters(build_adapters(http))
    }

    /// Panics on a duplicate key: two adapters claiming one publisher is a
    /// build defect, caught at boot.
    pub fn from_adapters(adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        let mut map: HashMap<String, Arc<dyn SourceAdapter>> = HashMap::new();
        for adapter in adapters {
            let key = adapter.key().to_lowercase();
            if map.insert(key.clone(), adapter).is_some() {
                panic!("Duplicate source adapter key: {key}");
            }
        }
        Self { adapters: map }
    }

    /// Case-insensitive lookup.
    pub fn get(&self, key: &str) -> Result<Arc<dyn SourceAdapter>> {
        self.adapters
            .get(&key.to_lowercase())
            .cloned()
            .ok_or_else(|| CollectError::UnknownSource(key.to_string()))
    }

    pub fn exists(&self, key: &str) -> bool {
        self.adapters.contains_key(&key.to_lowercase())
    }

    /// Pre-check for callers about to reference a publisher key in the
    /// catalog.
    pub fn validate_exists(&self, key: &str) -> Result<()> {
        if self.exists(key) {
            Ok(())
        } else {
            Err(CollectError::UnknownSource(key.to_string()))
        }
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedAdapter;

    fn registry() -> SourceRegistry {
        SourceRegistry::from_adapters(vec![
            Arc::new(ScriptedAdapter::succeeding("kakao", vec![])),
            Arc::new(ScriptedAdapter::succeeding("toss", vec![])),
        ])
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = registry();
        assert!(registry.get("KAKAO").is_ok());
        assert!(registry.get("Toss").is_ok());
    }

    #[test]
    fn unknown_key_is_an_error() {
        let registry = registry();
        let err = registry
            .get("netflix")
            .err()
            .expect("expected error for unknown source");
        assert!(matches!(err, CollectError::UnknownSource(_)));
        assert!(registry.validate_exists("netflix").is_err());
        assert!(!registry.exists("netflix"));
    }

    #[test]
    #[should_panic(expected = "Duplicate source adapter key")]
    fn duplicate_key_fails_at_boot() {
        SourceRegistry::from_adapters(vec![
            Arc::new(ScriptedAdapter::succeeding("kakao", vec![])),
            Arc::new(ScriptedAdapter::succeeding("kakao", vec![])),
        ]);
    }

    #[test]
    fn full_adapter_set_builds_cleanly() {
        let registry = SourceRegistry::new(&crate::http::Http::new());
        assert_eq!(registry.len(), 20);
        for key in ["kakaobank", "toss", "woowahan", "daangn"] {
            assert!(registry.exists(key), "missing adapter for {key}");
        }
    }
}
