//! The multiplex transaction coordinator.

use crate::registry::StoreRegistry;
use crate::transaction::state::{TransactionMode, TransactionState};
use plexstore_core::{
    CoreError, CoreResult, DataStoreTransaction, Entity, EntityClass, EntityDictionary, EntityId,
    FailureAccumulator, FilterExpression, FilterScope, Pagination, Predicate, Relation,
    RelationSpec, RequestScope, Sorting, StoreId, User,
};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A sub-transaction and the store it was opened against.
struct Participant {
    store: StoreId,
    txn: Box<dyn DataStoreTransaction>,
}

/// A transaction spanning every store of a [`StoreRegistry`].
///
/// One sub-transaction is opened per store, eagerly, in registration order.
/// Entity-scoped calls are forwarded unchanged to the sub-transaction of the
/// store owning the entity's class; lifecycle calls fan out to every
/// sub-transaction in registration order.
///
/// `MultiplexTransaction` itself implements [`DataStoreTransaction`], so it
/// can be used wherever a single store's transaction is expected.
///
/// # Guarantees
///
/// - `commit` flushes every sub-transaction before committing any of them.
/// - A commit failure is returned as-is. Sub-transactions that committed
///   before it stay committed.
/// - `close` attempts to close every sub-transaction, even after failures,
///   and reports all of them in one [`CoreError::Close`].
/// - A transaction dropped without `close` is closed on drop unless the
///   registry was configured otherwise.
pub struct MultiplexTransaction {
    registry: Arc<StoreRegistry>,
    mode: TransactionMode,
    /// Open sub-transactions in registration order.
    transactions: Vec<Participant>,
    /// Most recently opened sub-transaction.
    last_opened: Option<StoreId>,
    state: TransactionState,
}

impl MultiplexTransaction {
    /// Opens one sub-transaction per registered store.
    ///
    /// A failure to open any sub-transaction is returned immediately. The
    /// sub-transactions opened before it are released by the same close path
    /// as every other transaction, when the partially built transaction is
    /// dropped.
    pub(crate) fn begin(registry: Arc<StoreRegistry>, mode: TransactionMode) -> CoreResult<Self> {
        let mut multiplex = Self {
            registry: Arc::clone(&registry),
            mode,
            transactions: Vec::with_capacity(registry.len()),
            last_opened: None,
            state: TransactionState::Open,
        };

        for (store, data_store) in registry.stores() {
            let txn = match mode {
                TransactionMode::Write => data_store.begin_transaction()?,
                TransactionMode::Read => data_store.begin_read_transaction()?,
            };
            multiplex.transactions.push(Participant { store, txn });
            multiplex.last_opened = Some(store);
        }

        debug!(stores = multiplex.transactions.len(), ?mode, "began multiplex transaction");
        Ok(multiplex)
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns whether the transaction may write.
    #[must_use]
    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    /// Returns the registry the transaction routes through.
    #[must_use]
    pub fn registry(&self) -> &Arc<StoreRegistry> {
        &self.registry
    }

    /// Returns the number of open sub-transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Returns true if no sub-transaction is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Returns the stores with an open sub-transaction, in registration order.
    pub fn store_ids(&self) -> impl Iterator<Item = StoreId> + '_ {
        self.transactions.iter().map(|p| p.store)
    }

    /// Returns the most recently opened sub-transaction.
    ///
    /// This is the fallback for administrative calls that concern no entity
    /// class in particular. `None` once the transaction is closed or if no
    /// store is registered.
    pub fn last_opened(&mut self) -> Option<&mut dyn DataStoreTransaction> {
        let store = self.last_opened?;
        self.participant(store)
    }

    /// Wraps an opaque identity token and folds it through every
    /// sub-transaction.
    ///
    /// # Errors
    ///
    /// See [`DataStoreTransaction::access_user`].
    pub fn access_user_token<T: Any + Send + Sync>(&mut self, token: T) -> CoreResult<User> {
        self.access_user(User::new(token))
    }

    /// Returns the sub-transaction owning `class`.
    fn route(&mut self, class: &EntityClass) -> CoreResult<&mut dyn DataStoreTransaction> {
        self.ensure_open()?;
        let store = self.registry.resolve(class)?;
        trace!(%class, %store, "routing call");
        self.participant(store)
            .ok_or_else(|| CoreError::unknown_collection(class.name()))
    }

    fn participant(&mut self, store: StoreId) -> Option<&mut dyn DataStoreTransaction> {
        self.transactions
            .iter_mut()
            .find(|p| p.store == store)
            .map(|p| p.txn.as_mut() as &mut dyn DataStoreTransaction)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.state.is_closed() {
            return Err(CoreError::TransactionClosed);
        }
        Ok(())
    }

    fn ensure_writable(&self, operation: &'static str) -> CoreResult<()> {
        self.ensure_open()?;
        match self.mode {
            TransactionMode::Write => Ok(()),
            TransactionMode::Read => Err(CoreError::ReadOnlyTransaction { operation }),
        }
    }

    fn ensure_not_committed(&self, phase: &str) -> CoreResult<()> {
        match self.state {
            TransactionState::Closed => Err(CoreError::TransactionClosed),
            TransactionState::Committed => Err(CoreError::invalid_operation(format!(
                "{phase} after commit"
            ))),
            _ => Ok(()),
        }
    }

    fn flush_all(&mut self) -> CoreResult<()> {
        for participant in &mut self.transactions {
            participant.txn.flush()?;
        }
        self.state = self.state.advance(TransactionState::Flushed);
        Ok(())
    }
}

impl DataStoreTransaction for MultiplexTransaction {
    fn access_user(&mut self, user: User) -> CoreResult<User> {
        self.ensure_open()?;
        self.transactions
            .iter_mut()
            .try_fold(user, |user, participant| participant.txn.access_user(user))
    }

    fn create_object(&mut self, class: &EntityClass) -> CoreResult<Entity> {
        self.ensure_writable("create")?;
        self.route(class)?.create_object(class)
    }

    fn save(&mut self, entity: &Entity) -> CoreResult<()> {
        self.ensure_writable("save")?;
        self.route(entity.class())?.save(entity)
    }

    fn delete(&mut self, entity: &Entity) -> CoreResult<()> {
        self.ensure_writable("delete")?;
        self.route(entity.class())?.delete(entity)
    }

    fn load_object(&mut self, class: &EntityClass, id: &EntityId) -> CoreResult<Option<Entity>> {
        self.route(class)?.load_object(class, id)
    }

    fn load_object_filtered(
        &mut self,
        class: &EntityClass,
        id: &EntityId,
        filter: Option<&FilterExpression>,
    ) -> CoreResult<Option<Entity>> {
        self.route(class)?.load_object_filtered(class, id, filter)
    }

    fn load_objects(&mut self, class: &EntityClass) -> CoreResult<Vec<Entity>> {
        self.route(class)?.load_objects(class)
    }

    fn load_objects_scoped(
        &mut self,
        class: &EntityClass,
        scope: &FilterScope,
    ) -> CoreResult<Vec<Entity>> {
        self.route(class)?.load_objects_scoped(class, scope)
    }

    fn load_objects_with_sorting_and_pagination(
        &mut self,
        class: &EntityClass,
        scope: &FilterScope,
    ) -> CoreResult<Vec<Entity>> {
        self.route(class)?
            .load_objects_with_sorting_and_pagination(class, scope)
    }

    fn filter_collection(
        &mut self,
        collection: Vec<Entity>,
        class: &EntityClass,
        predicates: &[Predicate],
    ) -> CoreResult<Vec<Entity>> {
        self.route(class)?
            .filter_collection(collection, class, predicates)
    }

    fn filter_collection_with_sorting_and_pagination(
        &mut self,
        collection: Vec<Entity>,
        class: &EntityClass,
        dictionary: &EntityDictionary,
        predicates: Option<&[Predicate]>,
        sorting: Option<&Sorting>,
        pagination: Option<&Pagination>,
    ) -> CoreResult<Vec<Entity>> {
        self.route(class)?.filter_collection_with_sorting_and_pagination(
            collection, class, dictionary, predicates, sorting, pagination,
        )
    }

    fn get_relation(
        &mut self,
        entity: &Entity,
        relation: &RelationSpec,
        dictionary: &EntityDictionary,
        filter: Option<&FilterExpression>,
        sorting: Option<&Sorting>,
        pagination: Option<&Pagination>,
    ) -> CoreResult<Relation> {
        self.route(entity.class())?
            .get_relation(entity, relation, dictionary, filter, sorting, pagination)
    }

    fn get_relation_with_predicates(
        &mut self,
        entity: &Entity,
        relation: &RelationSpec,
        dictionary: &EntityDictionary,
        predicates: &[Predicate],
    ) -> CoreResult<Relation> {
        self.route(entity.class())?
            .get_relation_with_predicates(entity, relation, dictionary, predicates)
    }

    fn get_relation_with_sorting_and_pagination(
        &mut self,
        entity: &Entity,
        relation: &RelationSpec,
        dictionary: &EntityDictionary,
        predicates: &[Predicate],
        sorting: &Sorting,
        pagination: &Pagination,
    ) -> CoreResult<Relation> {
        self.route(entity.class())?.get_relation_with_sorting_and_pagination(
            entity, relation, dictionary, predicates, sorting, pagination,
        )
    }

    fn get_total_records(&mut self, class: &EntityClass) -> CoreResult<Option<u64>> {
        self.route(class)?.get_total_records(class)
    }

    fn flush(&mut self) -> CoreResult<()> {
        self.ensure_not_committed("flush")?;
        debug!(stores = self.transactions.len(), "flushing multiplex transaction");
        self.flush_all()
    }

    fn pre_commit(&mut self) -> CoreResult<()> {
        self.ensure_not_committed("pre-commit")?;
        debug!(stores = self.transactions.len(), "pre-committing multiplex transaction");
        for participant in &mut self.transactions {
            participant.txn.pre_commit()?;
        }
        self.state = self.state.advance(TransactionState::PreCommitted);
        Ok(())
    }

    fn commit(&mut self) -> CoreResult<()> {
        self.ensure_not_committed("commit")?;
        self.flush_all()?;

        debug!(stores = self.transactions.len(), "committing multiplex transaction");
        for participant in &mut self.transactions {
            participant.txn.commit()?;
        }
        self.state = self.state.advance(TransactionState::Committed);
        Ok(())
    }

    fn close(&mut self) -> CoreResult<()> {
        if self.state.is_closed() {
            return Ok(());
        }

        // Detached before closing; a panic below must not re-enter via Drop.
        let participants = std::mem::take(&mut self.transactions);
        self.last_opened = None;
        self.state = TransactionState::Closed;

        let mut failures = FailureAccumulator::new();
        for mut participant in participants {
            let outcome = participant.txn.close();
            if let Err(error) = &outcome {
                warn!(store = %participant.store, %error, "sub-transaction close failed");
            }
            failures.record(outcome);
        }
        debug!(clean = failures.is_clean(), "closed multiplex transaction");
        failures.finish()
    }

    fn set_request_scope(&mut self, scope: &RequestScope) {
        for participant in &mut self.transactions {
            participant.txn.set_request_scope(scope);
        }
    }
}

impl Drop for MultiplexTransaction {
    fn drop(&mut self) {
        if self.state.is_closed() || !self.registry.config().close_on_drop {
            return;
        }
        if let Err(error) = self.close() {
            warn!(%error, "failed to close dropped multiplex transaction");
        }
    }
}

impl fmt::Debug for MultiplexTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiplexTransaction")
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("stores", &self.store_ids().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
