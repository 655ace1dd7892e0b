//! Multiplex manager.

use crate::config::MultiplexConfig;
use crate::registry::{StoreRegistry, StoreRegistryBuilder};
use crate::transaction::{MultiplexTransaction, TransactionMode};
use plexstore_core::{CoreResult, DataStore, DataStoreTransaction, EntityDictionary};
use std::sync::Arc;

/// Entry point for multiplexed transactions.
///
/// The manager owns an immutable [`StoreRegistry`] and opens
/// [`MultiplexTransaction`]s against it. It is itself a [`DataStore`]: a
/// manager can be registered inside another manager, in which case its
/// classes route to it as a single store.
///
/// ```
/// use plexstore_core::DataStoreTransaction;
/// use plexstore_multiplex::MultiplexManager;
///
/// let manager = MultiplexManager::builder().build().unwrap();
/// let mut txn = manager.begin().unwrap();
/// assert!(txn.is_empty());
/// txn.close().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct MultiplexManager {
    registry: Arc<StoreRegistry>,
}

impl MultiplexManager {
    /// Starts building a manager.
    #[must_use]
    pub fn builder() -> MultiplexManagerBuilder {
        MultiplexManagerBuilder::default()
    }

    /// Creates a manager over an already built registry.
    #[must_use]
    pub fn new(registry: StoreRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Begins a read-write transaction across every registered store.
    ///
    /// # Errors
    ///
    /// Returns the first error any store reports while opening its
    /// sub-transaction.
    pub fn begin(&self) -> CoreResult<MultiplexTransaction> {
        MultiplexTransaction::begin(Arc::clone(&self.registry), TransactionMode::Write)
    }

    /// Begins a read-only transaction across every registered store.
    ///
    /// # Errors
    ///
    /// Returns the first error any store reports while opening its
    /// sub-transaction.
    pub fn begin_read(&self) -> CoreResult<MultiplexTransaction> {
        MultiplexTransaction::begin(Arc::clone(&self.registry), TransactionMode::Read)
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &StoreRegistry {
        &self.registry
    }
}

impl DataStore for MultiplexManager {
    fn name(&self) -> &str {
        "multiplex"
    }

    fn populate_entity_dictionary(&self, dictionary: &mut EntityDictionary) {
        let own = self.registry.dictionary();
        for class in own.bindings() {
            dictionary.bind_entity(class.clone());
        }
        for (runtime, canonical) in own.aliases() {
            dictionary.bind_alias(runtime.clone(), canonical.clone());
        }
    }

    fn begin_transaction(&self) -> CoreResult<Box<dyn DataStoreTransaction>> {
        Ok(Box::new(self.begin()?))
    }

    fn begin_read_transaction(&self) -> CoreResult<Box<dyn DataStoreTransaction>> {
        Ok(Box::new(self.begin_read()?))
    }
}

/// Builder for [`MultiplexManager`].
#[derive(Default)]
pub struct MultiplexManagerBuilder {
    registry: StoreRegistryBuilder,
}

impl MultiplexManagerBuilder {
    /// Registers a store. Stores are consulted in registration order.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn DataStore>) -> Self {
        self.registry = self.registry.store(store);
        self
    }

    /// Seeds the entity dictionary.
    #[must_use]
    pub fn dictionary(mut self, dictionary: EntityDictionary) -> Self {
        self.registry = self.registry.dictionary(dictionary);
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: MultiplexConfig) -> Self {
        self.registry = self.registry.config(config);
        self
    }

    /// Builds the registry and wraps it in a manager.
    ///
    /// # Errors
    ///
    /// See [`StoreRegistryBuilder::build`].
    pub fn build(self) -> CoreResult<MultiplexManager> {
        Ok(MultiplexManager::new(self.registry.build()?))
    }
}
