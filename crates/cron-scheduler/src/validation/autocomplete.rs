//! Autocomplete validators: allowed-value checks keyed by source id.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::jobs::{REPOSITORY_ID_SOURCE, STORAGE_ID_SOURCE};

use super::ValuePredicate;

#[derive(Clone, Default)]
pub struct AutocompleteValidators {
    sources: HashMap<String, ValuePredicate>,
}

impl AutocompleteValidators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sources backed by the configured storage layout:
    /// `storageId` accepts known storage ids, `repositoryId` any repository of any storage.
    pub fn for_storages(storages: &BTreeMap<String, Vec<String>>) -> Self {
        let storage_ids: BTreeSet<String> = storages.keys().cloned().collect();
        let repository_ids: BTreeSet<String> = storages.values().flatten().cloned().collect();

        Self::new()
            .with(STORAGE_ID_SOURCE, move |v| storage_ids.contains(v))
            .with(REPOSITORY_ID_SOURCE, move |v| repository_ids.contains(v))
    }

    pub fn register<F>(&mut self, source: impl Into<String>, predicate: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.sources.insert(source.into(), Arc::new(predicate));
    }

    pub fn with<F>(mut self, source: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.register(source, predicate);
        self
    }

    pub fn supports(&self, source: &str) -> bool {
        self.sources.contains_key(source)
    }

    /// `None` for an unregistered source
    pub fn check(&self, source: &str, value: &str) -> Option<bool> {
        self.sources.get(source).map(|predicate| predicate(value))
    }
}

impl fmt::Debug for AutocompleteValidators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutocompleteValidators")
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .finish()
    }
}
