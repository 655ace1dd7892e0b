//! Store registry and routing.

use crate::config::{DuplicateBindingPolicy, MultiplexConfig};
use plexstore_core::{CoreError, CoreResult, DataStore, EntityClass, EntityDictionary, StoreId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Maps entity classes to the data store that owns them.
///
/// The registry is built once and is read-only afterwards, so any number of
/// transactions may share it through an `Arc`.
pub struct StoreRegistry {
    /// Registered stores in registration order; the index is the `StoreId`.
    stores: Vec<Arc<dyn DataStore>>,
    /// Declared class -> owning store.
    routes: HashMap<EntityClass, StoreId>,
    /// Every class and alias declared by the stores.
    dictionary: EntityDictionary,
    config: MultiplexConfig,
}

impl StoreRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> StoreRegistryBuilder {
        StoreRegistryBuilder::default()
    }

    /// Resolves the store owning an entity class.
    ///
    /// The class is looked up directly first. If no store declared it, the
    /// entity dictionary is asked for the canonical class and the lookup is
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownEntityCollection`] naming the canonical
    /// class if one was found, the given class otherwise.
    pub fn resolve(&self, class: &EntityClass) -> CoreResult<StoreId> {
        if let Some(id) = self.routes.get(class) {
            return Ok(*id);
        }

        let canonical = self.dictionary.lookup_entity_class(class);
        if let Some(id) = canonical.as_ref().and_then(|c| self.routes.get(c)) {
            debug!(runtime = %class, store = %id, "routed through entity dictionary");
            return Ok(*id);
        }

        let name = canonical.as_ref().unwrap_or(class).name();
        Err(CoreError::unknown_collection(name))
    }

    /// Returns a registered store.
    #[must_use]
    pub fn store(&self, id: StoreId) -> Option<&Arc<dyn DataStore>> {
        self.stores.get(id.index())
    }

    /// Returns the registered stores in registration order.
    pub fn stores(&self) -> impl Iterator<Item = (StoreId, &Arc<dyn DataStore>)> {
        self.stores
            .iter()
            .enumerate()
            .map(|(index, store)| (StoreId::new(index), store))
    }

    /// Returns the number of registered stores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Returns true if no store is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Returns the dictionary of every declared class.
    #[must_use]
    pub fn dictionary(&self) -> &EntityDictionary {
        &self.dictionary
    }

    /// Returns the configuration the registry was built with.
    #[must_use]
    pub fn config(&self) -> &MultiplexConfig {
        &self.config
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.stores.iter().map(|s| s.name()).collect();
        f.debug_struct("StoreRegistry")
            .field("stores", &names)
            .field("classes", &self.routes.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`StoreRegistry`].
#[derive(Default)]
pub struct StoreRegistryBuilder {
    stores: Vec<Arc<dyn DataStore>>,
    dictionary: EntityDictionary,
    config: MultiplexConfig,
}

impl StoreRegistryBuilder {
    /// Registers a store. Stores are consulted in registration order.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn DataStore>) -> Self {
        self.stores.push(store);
        self
    }

    /// Seeds the registry with an externally maintained dictionary, for
    /// aliases the stores themselves do not know about.
    #[must_use]
    pub fn dictionary(mut self, dictionary: EntityDictionary) -> Self {
        self.dictionary = dictionary;
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: MultiplexConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the registry.
    ///
    /// Each store populates a dictionary of its own; every class it declares
    /// is routed to it and bound into the shared dictionary together with
    /// its aliases.
    ///
    /// # Errors
    ///
    /// - [`CoreError::DuplicateStore`] if a store instance is registered twice
    /// - [`CoreError::DuplicateBinding`] if two stores declare the same class
    ///   under [`DuplicateBindingPolicy::Reject`]
    pub fn build(self) -> CoreResult<StoreRegistry> {
        let Self {
            stores: candidates,
            mut dictionary,
            config,
        } = self;

        let mut stores: Vec<Arc<dyn DataStore>> = Vec::with_capacity(candidates.len());
        let mut routes: HashMap<EntityClass, StoreId> = HashMap::new();

        for (position, store) in candidates.into_iter().enumerate() {
            if stores.iter().any(|s| Arc::ptr_eq(s, &store)) {
                return Err(CoreError::DuplicateStore { position });
            }

            let id = StoreId::new(position);
            let mut declared = EntityDictionary::new();
            store.populate_entity_dictionary(&mut declared);

            for class in declared.bindings() {
                if let Some(previous) = routes.get(class).copied() {
                    let first = stores[previous.index()].name().to_string();
                    match config.duplicate_bindings {
                        DuplicateBindingPolicy::Reject => {
                            return Err(CoreError::DuplicateBinding {
                                class: class.to_string(),
                                first,
                                second: store.name().to_string(),
                            });
                        }
                        DuplicateBindingPolicy::LastWins => {
                            warn!(%class, %first, second = store.name(), "rebinding entity class");
                        }
                    }
                }
                routes.insert(class.clone(), id);
                dictionary.bind_entity(class.clone());
            }
            for (runtime, canonical) in declared.aliases() {
                dictionary.bind_alias(runtime.clone(), canonical.clone());
            }

            debug!(store = store.name(), %id, classes = declared.len(), "registered data store");
            stores.push(store);
        }

        Ok(StoreRegistry {
            stores,
            routes,
            dictionary,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexstore_testkit::{CallLog, RecordingStore};

    fn registry() -> StoreRegistry {
        let log = CallLog::new();
        StoreRegistry::builder()
            .store(Arc::new(
                RecordingStore::new("alpha", &log)
                    .owning("author")
                    .with_alias("AuthorProxy", "author"),
            ))
            .store(Arc::new(RecordingStore::new("beta", &log).owning("book")))
            .build()
            .unwrap()
    }

    #[test]
    fn resolves_declared_classes() {
        let registry = registry();
        assert_eq!(registry.resolve(&"author".into()).unwrap(), StoreId::new(0));
        assert_eq!(registry.resolve(&"book".into()).unwrap(), StoreId::new(1));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn resolves_alias_through_dictionary() {
        let registry = registry();
        assert_eq!(
            registry.resolve(&"AuthorProxy".into()).unwrap(),
            StoreId::new(0)
        );
    }

    #[test]
    fn unknown_class_fails_with_its_name() {
        let registry = registry();
        let err = registry.resolve(&"publisher".into()).unwrap_err();
        assert!(matches!(err, CoreError::UnknownEntityCollection { name } if name == "publisher"));
    }

    #[test]
    fn unrouted_canonical_class_is_named_in_error() {
        let mut seed = EntityDictionary::new();
        seed.bind_entity("magazine".into());
        seed.bind_alias("MagazineProxy".into(), "magazine".into());

        let log = CallLog::new();
        let registry = StoreRegistry::builder()
            .dictionary(seed)
            .store(Arc::new(RecordingStore::new("alpha", &log).owning("author")))
            .build()
            .unwrap();

        let err = registry.resolve(&"MagazineProxy".into()).unwrap_err();
        assert!(matches!(err, CoreError::UnknownEntityCollection { name } if name == "magazine"));
    }

    #[test]
    fn duplicate_binding_is_rejected_by_default() {
        let log = CallLog::new();
        let err = StoreRegistry::builder()
            .store(Arc::new(RecordingStore::new("alpha", &log).owning("author")))
            .store(Arc::new(RecordingStore::new("beta", &log).owning("author")))
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            CoreError::DuplicateBinding { class, first, second }
                if class == "author" && first == "alpha" && second == "beta"
        ));
    }

    #[test]
    fn duplicate_binding_last_wins_when_configured() {
        let log = CallLog::new();
        let registry = StoreRegistry::builder()
            .config(MultiplexConfig::new().duplicate_bindings(DuplicateBindingPolicy::LastWins))
            .store(Arc::new(RecordingStore::new("alpha", &log).owning("author")))
            .store(Arc::new(RecordingStore::new("beta", &log).owning("author")))
            .build()
            .unwrap();

        assert_eq!(registry.resolve(&"author".into()).unwrap(), StoreId::new(1));
        assert_eq!(registry.dictionary().len(), 1);
    }

    #[test]
    fn same_store_twice_is_rejected() {
        let log = CallLog::new();
        let store: Arc<dyn DataStore> = Arc::new(RecordingStore::new("alpha", &log).owning("a"));
        let err = StoreRegistry::builder()
            .store(Arc::clone(&store))
            .store(store)
            .build()
            .unwrap_err();

        assert!(matches!(err, CoreError::DuplicateStore { position: 1 }));
    }

    #[test]
    fn stores_iterate_in_registration_order() {
        let registry = registry();
        let names: Vec<_> = registry.stores().map(|(_, s)| s.name().to_string()).collect();
        assert_eq!(names, ["alpha", "beta"]);
        assert!(registry.store(StoreId::new(2)).is_none());
    }
}
