use alloc::{
    boxed::Box,
    collections::BTreeMap,
    string::{String, ToString as _},
};

use crate::instance::Instance;

/// Built instances of one injector, keyed by service name.
///
/// Entries are never evicted or replaced.
#[derive(Clone, Default)]
pub(crate) struct Cache {
    map: Option<Box<BTreeMap<String, Instance>>>,
}

impl Cache {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self { map: None }
    }

    #[must_use]
    pub(crate) fn get(&self, name: &str) -> Option<Instance> {
        self.map.as_ref().and_then(|map| map.get(name)).cloned()
    }

    /// Inserts `instance` unless the name is already cached and returns the instance that stays cached.
    #[inline]
    pub(crate) fn insert(&mut self, name: &str, instance: Instance) -> Instance {
        self.map
            .get_or_insert_with(Box::default)
            .entry(name.to_string())
            .or_insert(instance)
            .clone()
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.map.as_ref().map_or(0, |map| map.len())
    }
}
