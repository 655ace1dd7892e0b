//! Recording data store.
//!
//! A [`RecordingStore`] owns a configurable set of entity classes and writes
//! every call its transactions receive into a shared [`CallLog`]. Several
//! stores can share one log, which then holds the global call order.

use parking_lot::Mutex;
use plexstore_core::{
    CoreError, CoreResult, DataStore, DataStoreTransaction, Entity, EntityClass, EntityDictionary,
    EntityId, FilterExpression, FilterScope, Pagination, Predicate, Relation, RelationSpec,
    RequestScope, Sorting, User,
};
use serde_json::json;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A call received by a recording store or one of its transactions.
#[derive(Debug, Clone)]
pub enum Call {
    /// A read-write transaction was requested.
    Begin,
    /// A read-only transaction was requested.
    BeginRead,
    /// `access_user` with the user it received.
    AccessUser(User),
    /// `create_object`.
    CreateObject(EntityClass),
    /// `save`.
    Save(EntityClass),
    /// `delete`.
    Delete(EntityClass),
    /// `load_object`.
    LoadObject(EntityClass, EntityId),
    /// `load_object_filtered`.
    LoadObjectFiltered(EntityClass, EntityId),
    /// `load_objects`.
    LoadObjects(EntityClass),
    /// `load_objects_scoped`.
    LoadObjectsScoped(EntityClass),
    /// `load_objects_with_sorting_and_pagination`.
    LoadObjectsSortedPaged(EntityClass),
    /// `filter_collection`.
    FilterCollection(EntityClass),
    /// `filter_collection_with_sorting_and_pagination`.
    FilterCollectionSortedPaged(EntityClass),
    /// `get_relation`, with the parent entity's class.
    GetRelation(EntityClass),
    /// `get_relation_with_predicates`.
    GetRelationWithPredicates(EntityClass),
    /// `get_relation_with_sorting_and_pagination`.
    GetRelationSortedPaged(EntityClass),
    /// `get_total_records`.
    GetTotalRecords(EntityClass),
    /// `flush`.
    Flush,
    /// `pre_commit`.
    PreCommit,
    /// `commit`.
    Commit,
    /// `close`.
    Close,
    /// `set_request_scope`.
    SetRequestScope,
}

impl Call {
    /// Short, stable name of the call.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::BeginRead => "begin-read",
            Self::AccessUser(_) => "access-user",
            Self::CreateObject(_) => "create-object",
            Self::Save(_) => "save",
            Self::Delete(_) => "delete",
            Self::LoadObject(..) => "load-object",
            Self::LoadObjectFiltered(..) => "load-object-filtered",
            Self::LoadObjects(_) => "load-objects",
            Self::LoadObjectsScoped(_) => "load-objects-scoped",
            Self::LoadObjectsSortedPaged(_) => "load-objects-sorted-paged",
            Self::FilterCollection(_) => "filter-collection",
            Self::FilterCollectionSortedPaged(_) => "filter-collection-sorted-paged",
            Self::GetRelation(_) => "get-relation",
            Self::GetRelationWithPredicates(_) => "get-relation-with-predicates",
            Self::GetRelationSortedPaged(_) => "get-relation-sorted-paged",
            Self::GetTotalRecords(_) => "get-total-records",
            Self::Flush => "flush",
            Self::PreCommit => "pre-commit",
            Self::Commit => "commit",
            Self::Close => "close",
            Self::SetRequestScope => "set-request-scope",
        }
    }

    /// The entity class the call concerns, if any.
    #[must_use]
    pub fn class(&self) -> Option<&EntityClass> {
        match self {
            Self::CreateObject(c)
            | Self::Save(c)
            | Self::Delete(c)
            | Self::LoadObject(c, _)
            | Self::LoadObjectFiltered(c, _)
            | Self::LoadObjects(c)
            | Self::LoadObjectsScoped(c)
            | Self::LoadObjectsSortedPaged(c)
            | Self::FilterCollection(c)
            | Self::FilterCollectionSortedPaged(c)
            | Self::GetRelation(c)
            | Self::GetRelationWithPredicates(c)
            | Self::GetRelationSortedPaged(c)
            | Self::GetTotalRecords(c) => Some(c),
            _ => None,
        }
    }
}

/// One entry of a [`CallLog`].
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// Name of the store that received the call.
    pub store: &'static str,
    /// Serial number of the transaction within its store, starting at 1.
    pub txn: u64,
    /// The call.
    pub call: Call,
}

/// Ordered log of calls, shared between recording stores.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    records: Arc<Mutex<Vec<CallRecord>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, store: &'static str, txn: u64, call: Call) {
        self.records.lock().push(CallRecord { store, txn, call });
    }

    /// Returns a snapshot of every record.
    #[must_use]
    pub fn records(&self) -> Vec<CallRecord> {
        self.records.lock().clone()
    }

    /// Returns the calls received by one store, in order.
    #[must_use]
    pub fn calls_for(&self, store: &str) -> Vec<Call> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.store == store)
            .map(|r| r.call.clone())
            .collect()
    }

    /// Returns `(store, call name)` pairs, in order.
    #[must_use]
    pub fn names(&self) -> Vec<(&'static str, &'static str)> {
        self.records
            .lock()
            .iter()
            .map(|r| (r.store, r.call.name()))
            .collect()
    }

    /// Returns the call names received by one store, in order.
    #[must_use]
    pub fn names_for(&self, store: &str) -> Vec<&'static str> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.store == store)
            .map(|r| r.call.name())
            .collect()
    }

    /// Counts the calls with the given name across all stores.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.call.name() == name)
            .count()
    }

    /// Forgets every record.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

/// A phase a recording store can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Opening a transaction.
    Begin,
    /// `access_user`.
    AccessUser,
    /// `flush`.
    Flush,
    /// `pre_commit`.
    PreCommit,
    /// `commit`.
    Commit,
    /// `close`.
    Close,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Begin => "begin",
            Self::AccessUser => "access-user",
            Self::Flush => "flush",
            Self::PreCommit => "pre-commit",
            Self::Commit => "commit",
            Self::Close => "close",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
struct Behavior {
    name: &'static str,
    log: CallLog,
    faults: Vec<Fault>,
    panics: Vec<Fault>,
    role: Option<String>,
}

impl Behavior {
    fn check(&self, fault: Fault) -> CoreResult<()> {
        if self.panics.contains(&fault) {
            panic!("{}: injected {fault} panic", self.name);
        }
        if self.faults.contains(&fault) {
            return Err(CoreError::store(format!(
                "{}: injected {fault} failure",
                self.name
            )));
        }
        Ok(())
    }
}

/// A data store that records every call.
///
/// Entities returned by its transactions carry a `"store"` attribute set to
/// the store's name.
#[derive(Debug)]
pub struct RecordingStore {
    behavior: Arc<Behavior>,
    classes: Vec<EntityClass>,
    aliases: Vec<(EntityClass, EntityClass)>,
    serial: AtomicU64,
}

impl RecordingStore {
    /// Creates a store that records into `log`.
    #[must_use]
    pub fn new(name: &'static str, log: &CallLog) -> Self {
        Self {
            behavior: Arc::new(Behavior {
                name,
                log: log.clone(),
                faults: Vec::new(),
                panics: Vec::new(),
                role: None,
            }),
            classes: Vec::new(),
            aliases: Vec::new(),
            serial: AtomicU64::new(0),
        }
    }

    /// Declares an entity class owned by this store.
    #[must_use]
    pub fn owning(mut self, class: impl Into<EntityClass>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Declares a runtime class standing for one of the owned classes.
    #[must_use]
    pub fn with_alias(
        mut self,
        runtime: impl Into<EntityClass>,
        canonical: impl Into<EntityClass>,
    ) -> Self {
        self.aliases.push((runtime.into(), canonical.into()));
        self
    }

    /// Makes the given phase fail.
    #[must_use]
    pub fn failing(mut self, fault: Fault) -> Self {
        self.behavior_mut().faults.push(fault);
        self
    }

    /// Makes the given phase panic instead of returning.
    #[must_use]
    pub fn panicking(mut self, fault: Fault) -> Self {
        self.behavior_mut().panics.push(fault);
        self
    }

    /// Makes `access_user` add a role to the user it returns.
    #[must_use]
    pub fn granting_role(mut self, role: impl Into<String>) -> Self {
        self.behavior_mut().role = Some(role.into());
        self
    }

    fn behavior_mut(&mut self) -> &mut Behavior {
        Arc::make_mut(&mut self.behavior)
    }

    fn open(&self, call: Call) -> CoreResult<Box<dyn DataStoreTransaction>> {
        let serial = self.serial.fetch_add(1, Ordering::Relaxed) + 1;
        self.behavior.log.push(self.behavior.name, serial, call);
        self.behavior.check(Fault::Begin)?;
        Ok(Box::new(RecordingTransaction {
            behavior: Arc::clone(&self.behavior),
            serial,
        }))
    }
}

impl DataStore for RecordingStore {
    fn name(&self) -> &str {
        self.behavior.name
    }

    fn populate_entity_dictionary(&self, dictionary: &mut EntityDictionary) {
        for class in &self.classes {
            dictionary.bind_entity(class.clone());
        }
        for (runtime, canonical) in &self.aliases {
            dictionary.bind_alias(runtime.clone(), canonical.clone());
        }
    }

    fn begin_transaction(&self) -> CoreResult<Box<dyn DataStoreTransaction>> {
        self.open(Call::Begin)
    }

    fn begin_read_transaction(&self) -> CoreResult<Box<dyn DataStoreTransaction>> {
        self.open(Call::BeginRead)
    }
}

struct RecordingTransaction {
    behavior: Arc<Behavior>,
    serial: u64,
}

impl RecordingTransaction {
    fn record(&self, call: Call) {
        self.behavior.log.push(self.behavior.name, self.serial, call);
    }

    fn stamp(&self, entity: Entity) -> Entity {
        entity.with_attribute("store", json!(self.behavior.name))
    }

    fn relation(&self, relation: &RelationSpec) -> Relation {
        let related = self.stamp(Entity::new(relation.class.clone()).with_id("1"));
        if relation.relationship_type.is_to_one() {
            Relation::ToOne(Some(related))
        } else {
            Relation::ToMany(vec![related])
        }
    }
}

impl DataStoreTransaction for RecordingTransaction {
    fn access_user(&mut self, user: User) -> CoreResult<User> {
        self.record(Call::AccessUser(user.clone()));
        self.behavior.check(Fault::AccessUser)?;
        Ok(match &self.behavior.role {
            Some(role) => user.with_role(role.clone()),
            None => user,
        })
    }

    fn create_object(&mut self, class: &EntityClass) -> CoreResult<Entity> {
        self.record(Call::CreateObject(class.clone()));
        Ok(self.stamp(Entity::new(class.clone())))
    }

    fn save(&mut self, entity: &Entity) -> CoreResult<()> {
        self.record(Call::Save(entity.class().clone()));
        Ok(())
    }

    fn delete(&mut self, entity: &Entity) -> CoreResult<()> {
        self.record(Call::Delete(entity.class().clone()));
        Ok(())
    }

    fn load_object(&mut self, class: &EntityClass, id: &EntityId) -> CoreResult<Option<Entity>> {
        self.record(Call::LoadObject(class.clone(), id.clone()));
        Ok(Some(self.stamp(Entity::new(class.clone()).with_id(id.clone()))))
    }

    fn load_object_filtered(
        &mut self,
        class: &EntityClass,
        id: &EntityId,
        _filter: Option<&FilterExpression>,
    ) -> CoreResult<Option<Entity>> {
        self.record(Call::LoadObjectFiltered(class.clone(), id.clone()));
        Ok(Some(self.stamp(Entity::new(class.clone()).with_id(id.clone()))))
    }

    fn load_objects(&mut self, class: &EntityClass) -> CoreResult<Vec<Entity>> {
        self.record(Call::LoadObjects(class.clone()));
        Ok(vec![self.stamp(Entity::new(class.clone()).with_id("1"))])
    }

    fn load_objects_scoped(
        &mut self,
        class: &EntityClass,
        _scope: &FilterScope,
    ) -> CoreResult<Vec<Entity>> {
        self.record(Call::LoadObjectsScoped(class.clone()));
        Ok(vec![self.stamp(Entity::new(class.clone()).with_id("1"))])
    }

    fn load_objects_with_sorting_and_pagination(
        &mut self,
        class: &EntityClass,
        _scope: &FilterScope,
    ) -> CoreResult<Vec<Entity>> {
        self.record(Call::LoadObjectsSortedPaged(class.clone()));
        Ok(vec![self.stamp(Entity::new(class.clone()).with_id("1"))])
    }

    fn filter_collection(
        &mut self,
        collection: Vec<Entity>,
        class: &EntityClass,
        _predicates: &[Predicate],
    ) -> CoreResult<Vec<Entity>> {
        self.record(Call::FilterCollection(class.clone()));
        Ok(collection)
    }

    fn filter_collection_with_sorting_and_pagination(
        &mut self,
        collection: Vec<Entity>,
        class: &EntityClass,
        _dictionary: &EntityDictionary,
        _predicates: Option<&[Predicate]>,
        _sorting: Option<&Sorting>,
        _pagination: Option<&Pagination>,
    ) -> CoreResult<Vec<Entity>> {
        self.record(Call::FilterCollectionSortedPaged(class.clone()));
        Ok(collection)
    }

    fn get_relation(
        &mut self,
        entity: &Entity,
        relation: &RelationSpec,
        _dictionary: &EntityDictionary,
        _filter: Option<&FilterExpression>,
        _sorting: Option<&Sorting>,
        _pagination: Option<&Pagination>,
    ) -> CoreResult<Relation> {
        self.record(Call::GetRelation(entity.class().clone()));
        Ok(self.relation(relation))
    }

    fn get_relation_with_predicates(
        &mut self,
        entity: &Entity,
        relation: &RelationSpec,
        _dictionary: &EntityDictionary,
        _predicates: &[Predicate],
    ) -> CoreResult<Relation> {
        self.record(Call::GetRelationWithPredicates(entity.class().clone()));
        Ok(self.relation(relation))
    }

    fn get_relation_with_sorting_and_pagination(
        &mut self,
        entity: &Entity,
        relation: &RelationSpec,
        _dictionary: &EntityDictionary,
        _predicates: &[Predicate],
        _sorting: &Sorting,
        _pagination: &Pagination,
    ) -> CoreResult<Relation> {
        self.record(Call::GetRelationSortedPaged(entity.class().clone()));
        Ok(self.relation(relation))
    }

    fn get_total_records(&mut self, class: &EntityClass) -> CoreResult<Option<u64>> {
        self.record(Call::GetTotalRecords(class.clone()));
        Ok(Some(1))
    }

    fn flush(&mut self) -> CoreResult<()> {
        self.record(Call::Flush);
        self.behavior.check(Fault::Flush)
    }

    fn pre_commit(&mut self) -> CoreResult<()> {
        self.record(Call::PreCommit);
        self.behavior.check(Fault::PreCommit)
    }

    fn commit(&mut self) -> CoreResult<()> {
        self.record(Call::Commit);
        self.behavior.check(Fault::Commit)
    }

    fn close(&mut self) -> CoreResult<()> {
        self.record(Call::Close);
        self.behavior.check(Fault::Close)
    }

    fn set_request_scope(&mut self, _scope: &RequestScope) {
        self.record(Call::SetRequestScope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order_across_stores() {
        let log = CallLog::new();
        let alpha = RecordingStore::new("alpha", &log).owning("author");
        let beta = RecordingStore::new("beta", &log).owning("book");

        let mut a = alpha.begin_transaction().unwrap();
        let mut b = beta.begin_read_transaction().unwrap();
        a.flush().unwrap();
        b.close().unwrap();

        assert_eq!(
            log.names(),
            [
                ("alpha", "begin"),
                ("beta", "begin-read"),
                ("alpha", "flush"),
                ("beta", "close"),
            ]
        );
    }

    #[test]
    fn injected_failures_name_the_store() {
        let log = CallLog::new();
        let store = RecordingStore::new("alpha", &log)
            .failing(Fault::Commit)
            .failing(Fault::Close);
        let mut txn = store.begin_transaction().unwrap();

        txn.flush().unwrap();
        let err = txn.commit().unwrap_err();
        assert_eq!(err.to_string(), "store error: alpha: injected commit failure");
        assert!(txn.close().is_err());
        assert_eq!(log.names_for("alpha"), ["begin", "flush", "commit", "close"]);
    }

    #[test]
    #[should_panic(expected = "alpha: injected close panic")]
    fn injected_panic_names_the_store() {
        let log = CallLog::new();
        let store = RecordingStore::new("alpha", &log).panicking(Fault::Close);
        let mut txn = store.begin_transaction().unwrap();
        let _ = txn.close();
    }

    #[test]
    fn begin_failure_is_still_recorded() {
        let log = CallLog::new();
        let store = RecordingStore::new("alpha", &log).failing(Fault::Begin);
        assert!(store.begin_transaction().is_err());
        assert_eq!(log.names_for("alpha"), ["begin"]);
    }

    #[test]
    fn transactions_are_numbered_per_store() {
        let log = CallLog::new();
        let store = RecordingStore::new("alpha", &log);
        let _first = store.begin_transaction().unwrap();
        let _second = store.begin_transaction().unwrap();

        let serials: Vec<_> = log.records().iter().map(|r| r.txn).collect();
        assert_eq!(serials, [1, 2]);
    }

    #[test]
    fn granted_role_is_added_to_user() {
        let log = CallLog::new();
        let store = RecordingStore::new("alpha", &log).granting_role("reader");
        let mut txn = store.begin_transaction().unwrap();

        let user = txn.access_user(User::new(7_u32)).unwrap();
        assert!(user.has_role("reader"));
        assert_eq!(user.opaque::<u32>(), Some(&7));
    }

    #[test]
    fn returned_entities_are_stamped() {
        let log = CallLog::new();
        let store = RecordingStore::new("alpha", &log).owning("author");
        let mut txn = store.begin_transaction().unwrap();

        let entity = txn.create_object(&"author".into()).unwrap();
        assert_eq!(entity.attribute("store"), Some(&json!("alpha")));
        assert_eq!(
            log.calls_for("alpha")[1].class(),
            Some(&EntityClass::new("author"))
        );
    }
}
