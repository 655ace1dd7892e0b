//! Data store and transaction contracts.

use crate::dictionary::EntityDictionary;
use crate::entity::{Entity, Relation, RelationshipType};
use crate::error::CoreResult;
use crate::query::{FilterExpression, FilterScope, Pagination, Predicate, Sorting};
use crate::request::RequestScope;
use crate::types::{EntityClass, EntityId};
use crate::user::User;

/// A backing data store.
///
/// A store declares the entity classes it owns and opens transactions
/// against itself. Stores are addressed by identity; two stores with the same
/// contents are still two stores.
///
/// # Implementors
///
/// Stores must be `Send + Sync`: one store serves many concurrent
/// transactions and is responsible for its own concurrency control.
pub trait DataStore: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Declares the entity classes (and aliases) this store owns.
    fn populate_entity_dictionary(&self, dictionary: &mut EntityDictionary);

    /// Opens a read-write transaction.
    ///
    /// # Errors
    ///
    /// Returns whatever error the store reports when it cannot open one.
    fn begin_transaction(&self) -> CoreResult<Box<dyn DataStoreTransaction>>;

    /// Opens a read-only transaction.
    ///
    /// Defaults to [`DataStore::begin_transaction`].
    ///
    /// # Errors
    ///
    /// Returns whatever error the store reports when it cannot open one.
    fn begin_read_transaction(&self) -> CoreResult<Box<dyn DataStoreTransaction>> {
        self.begin_transaction()
    }
}

/// Names the relationship a relation computation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSpec {
    /// Cardinality of the relationship.
    pub relationship_type: RelationshipType,
    /// Relationship name on the parent entity.
    pub name: String,
    /// Class of the related entities.
    pub class: EntityClass,
}

impl RelationSpec {
    /// Creates a relation spec.
    pub fn new(
        relationship_type: RelationshipType,
        name: impl Into<String>,
        class: EntityClass,
    ) -> Self {
        Self {
            relationship_type,
            name: name.into(),
            class,
        }
    }
}

/// A transaction against one data store.
///
/// Every method receives the entity class or instance it concerns, so a
/// coordinator can route each call to the store owning that class. The
/// lifecycle is `flush` → `pre_commit` → `commit` → `close`; `commit` is
/// expected to make flushed changes visible to later transactions, `close`
/// releases the transaction's resources whatever happened before.
///
/// Methods documented as legacy have default implementations in terms of
/// the current ones.
pub trait DataStoreTransaction: Send {
    /// Lets the store validate or enrich the caller identity.
    ///
    /// The default returns the user unchanged.
    fn access_user(&mut self, user: User) -> CoreResult<User> {
        Ok(user)
    }

    /// Creates a new, unsaved entity of the given class.
    fn create_object(&mut self, class: &EntityClass) -> CoreResult<Entity>;

    /// Queues an entity for insertion or update.
    fn save(&mut self, entity: &Entity) -> CoreResult<()>;

    /// Queues an entity for deletion.
    fn delete(&mut self, entity: &Entity) -> CoreResult<()>;

    /// Loads an entity by id.
    fn load_object(&mut self, class: &EntityClass, id: &EntityId) -> CoreResult<Option<Entity>>;

    /// Loads an entity by id if it also satisfies the filter.
    fn load_object_filtered(
        &mut self,
        class: &EntityClass,
        id: &EntityId,
        filter: Option<&FilterExpression>,
    ) -> CoreResult<Option<Entity>>;

    /// Loads every entity of a class.
    fn load_objects(&mut self, class: &EntityClass) -> CoreResult<Vec<Entity>> {
        self.load_objects_scoped(class, &FilterScope::default())
    }

    /// Loads entities of a class under a filter scope.
    fn load_objects_scoped(
        &mut self,
        class: &EntityClass,
        scope: &FilterScope,
    ) -> CoreResult<Vec<Entity>>;

    /// Legacy: loads entities honoring the scope's sorting and pagination.
    fn load_objects_with_sorting_and_pagination(
        &mut self,
        class: &EntityClass,
        scope: &FilterScope,
    ) -> CoreResult<Vec<Entity>> {
        self.load_objects_scoped(class, scope)
    }

    /// Legacy: filters an already loaded collection.
    ///
    /// The default returns the collection unchanged.
    fn filter_collection(
        &mut self,
        collection: Vec<Entity>,
        class: &EntityClass,
        predicates: &[Predicate],
    ) -> CoreResult<Vec<Entity>> {
        let _ = (class, predicates);
        Ok(collection)
    }

    /// Legacy: filters, sorts and pages an already loaded collection.
    ///
    /// The default returns the collection unchanged.
    fn filter_collection_with_sorting_and_pagination(
        &mut self,
        collection: Vec<Entity>,
        class: &EntityClass,
        dictionary: &EntityDictionary,
        predicates: Option<&[Predicate]>,
        sorting: Option<&Sorting>,
        pagination: Option<&Pagination>,
    ) -> CoreResult<Vec<Entity>> {
        let _ = (class, dictionary, predicates, sorting, pagination);
        Ok(collection)
    }

    /// Computes the value of a relationship of `entity`.
    fn get_relation(
        &mut self,
        entity: &Entity,
        relation: &RelationSpec,
        dictionary: &EntityDictionary,
        filter: Option<&FilterExpression>,
        sorting: Option<&Sorting>,
        pagination: Option<&Pagination>,
    ) -> CoreResult<Relation>;

    /// Legacy: computes a relationship filtered by a predicate set.
    fn get_relation_with_predicates(
        &mut self,
        entity: &Entity,
        relation: &RelationSpec,
        dictionary: &EntityDictionary,
        predicates: &[Predicate],
    ) -> CoreResult<Relation> {
        let filter = conjunction(predicates);
        self.get_relation(entity, relation, dictionary, filter.as_ref(), None, None)
    }

    /// Legacy: computes a relationship filtered, sorted and paged.
    fn get_relation_with_sorting_and_pagination(
        &mut self,
        entity: &Entity,
        relation: &RelationSpec,
        dictionary: &EntityDictionary,
        predicates: &[Predicate],
        sorting: &Sorting,
        pagination: &Pagination,
    ) -> CoreResult<Relation> {
        let filter = conjunction(predicates);
        self.get_relation(
            entity,
            relation,
            dictionary,
            filter.as_ref(),
            Some(sorting),
            Some(pagination),
        )
    }

    /// Returns the total number of records of a class, if the store tracks it.
    fn get_total_records(&mut self, class: &EntityClass) -> CoreResult<Option<u64>> {
        let _ = class;
        Ok(None)
    }

    /// Pushes queued changes down to the store without committing.
    fn flush(&mut self) -> CoreResult<()>;

    /// Runs checks that must pass before commit.
    fn pre_commit(&mut self) -> CoreResult<()> {
        Ok(())
    }

    /// Makes the transaction's changes durable and visible.
    fn commit(&mut self) -> CoreResult<()>;

    /// Releases the transaction.
    fn close(&mut self) -> CoreResult<()>;

    /// Hands the request context to request-scoped transactions.
    ///
    /// The default ignores it.
    fn set_request_scope(&mut self, scope: &RequestScope) {
        let _ = scope;
    }
}

/// Folds a predicate set into a single `And` expression.
#[must_use]
pub fn conjunction(predicates: &[Predicate]) -> Option<FilterExpression> {
    predicates
        .iter()
        .cloned()
        .map(FilterExpression::Predicate)
        .reduce(FilterExpression::and)
}
