//! In-memory data store.
//!
//! Committed data lives behind a shared lock. Each transaction queues its
//! writes and applies them on commit, so loads only ever observe committed
//! state. Declared aliases share the table of their canonical class.
//!
//! Ids come from one sequence per store. `create_object` draws the id up
//! front so the caller can find the entity again after commit. An entity
//! saved without an id only gets one on commit, and the caller's copy
//! stays without it.

use parking_lot::RwLock;
use plexstore_core::{
    conjunction, CoreError, CoreResult, DataStore, DataStoreTransaction, Entity, EntityClass,
    EntityDictionary, EntityId, FilterExpression, FilterScope, Operator, Pagination, Predicate,
    Relation, RelationSpec, SortOrder, Sorting,
};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::trace;

type Tables = HashMap<EntityClass, BTreeMap<EntityId, Entity>>;

/// A volatile data store holding entities in memory.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    classes: Vec<EntityClass>,
    aliases: HashMap<EntityClass, EntityClass>,
    tables: Arc<RwLock<Tables>>,
    sequence: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classes: Vec::new(),
            aliases: HashMap::new(),
            tables: Arc::default(),
            sequence: Arc::default(),
        }
    }

    /// Declares an entity class owned by this store.
    #[must_use]
    pub fn owning(mut self, class: impl Into<EntityClass>) -> Self {
        let class = class.into();
        self.tables.write().entry(class.clone()).or_default();
        self.classes.push(class);
        self
    }

    /// Declares a runtime class standing for one of the owned classes.
    #[must_use]
    pub fn with_alias(
        mut self,
        runtime: impl Into<EntityClass>,
        canonical: impl Into<EntityClass>,
    ) -> Self {
        self.aliases.insert(runtime.into(), canonical.into());
        self
    }

    /// Returns the committed entities of a class, ordered by id.
    #[must_use]
    pub fn snapshot(&self, class: &EntityClass) -> Vec<Entity> {
        self.tables
            .read()
            .get(canonical(&self.aliases, class))
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl DataStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
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
        Ok(Box::new(MemoryTransaction {
            tables: Arc::clone(&self.tables),
            aliases: self.aliases.clone(),
            sequence: Arc::clone(&self.sequence),
            pending: Vec::new(),
        }))
    }
}

enum Write {
    Save(Entity),
    Delete(EntityClass, EntityId),
}

struct MemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    aliases: HashMap<EntityClass, EntityClass>,
    sequence: Arc<AtomicU64>,
    pending: Vec<Write>,
}

impl MemoryTransaction {
    /// Returns the table class `class` is stored under, if this store owns it.
    fn owned(&self, class: &EntityClass) -> CoreResult<EntityClass> {
        let table = canonical(&self.aliases, class);
        if self.tables.read().contains_key(table) {
            Ok(table.clone())
        } else {
            Err(CoreError::unknown_collection(class.name()))
        }
    }

    fn scan(&self, class: &EntityClass) -> CoreResult<Vec<Entity>> {
        self.tables
            .read()
            .get(canonical(&self.aliases, class))
            .map(|table| table.values().cloned().collect())
            .ok_or_else(|| CoreError::unknown_collection(class.name()))
    }
}

/// Maps an alias to the class it stands for.
fn canonical<'a>(
    aliases: &'a HashMap<EntityClass, EntityClass>,
    class: &'a EntityClass,
) -> &'a EntityClass {
    aliases.get(class).unwrap_or(class)
}

/// An id of `None` or `"0"` means the store should assign one.
fn is_unset(id: Option<&EntityId>) -> bool {
    id.map_or(true, |id| id.as_str() == "0")
}

/// Draws the next sequence value not already used as an id in `table`.
fn next_free_id(sequence: &AtomicU64, table: Option<&BTreeMap<EntityId, Entity>>) -> EntityId {
    loop {
        let candidate = sequence.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        let id = EntityId::new(candidate.to_string());
        if !table.is_some_and(|table| table.contains_key(&id)) {
            return id;
        }
    }
}

impl DataStoreTransaction for MemoryTransaction {
    fn create_object(&mut self, class: &EntityClass) -> CoreResult<Entity> {
        let table = self.owned(class)?;
        let id = next_free_id(&self.sequence, self.tables.read().get(&table));
        Ok(Entity::new(class.clone()).with_id(id))
    }

    fn save(&mut self, entity: &Entity) -> CoreResult<()> {
        self.owned(entity.class())?;
        self.pending.push(Write::Save(entity.clone()));
        Ok(())
    }

    fn delete(&mut self, entity: &Entity) -> CoreResult<()> {
        let table = self.owned(entity.class())?;
        let id = entity
            .id()
            .cloned()
            .ok_or_else(|| CoreError::invalid_operation("cannot delete an entity without id"))?;
        self.pending.push(Write::Delete(table, id));
        Ok(())
    }

    fn load_object(&mut self, class: &EntityClass, id: &EntityId) -> CoreResult<Option<Entity>> {
        self.load_object_filtered(class, id, None)
    }

    fn load_object_filtered(
        &mut self,
        class: &EntityClass,
        id: &EntityId,
        filter: Option<&FilterExpression>,
    ) -> CoreResult<Option<Entity>> {
        let tables = self.tables.read();
        let table = tables
            .get(canonical(&self.aliases, class))
            .ok_or_else(|| CoreError::unknown_collection(class.name()))?;
        Ok(table
            .get(id)
            .filter(|entity| filter.map_or(true, |f| matches(entity, f)))
            .cloned())
    }

    fn load_objects_scoped(
        &mut self,
        class: &EntityClass,
        scope: &FilterScope,
    ) -> CoreResult<Vec<Entity>> {
        let entities = self.scan(class)?;
        Ok(shape(
            entities,
            scope.filter.as_ref(),
            scope.sorting.as_ref(),
            scope.pagination.as_ref(),
        ))
    }

    fn filter_collection(
        &mut self,
        collection: Vec<Entity>,
        _class: &EntityClass,
        predicates: &[Predicate],
    ) -> CoreResult<Vec<Entity>> {
        let filter = conjunction(predicates);
        Ok(shape(collection, filter.as_ref(), None, None))
    }

    fn filter_collection_with_sorting_and_pagination(
        &mut self,
        collection: Vec<Entity>,
        _class: &EntityClass,
        _dictionary: &EntityDictionary,
        predicates: Option<&[Predicate]>,
        sorting: Option<&Sorting>,
        pagination: Option<&Pagination>,
    ) -> CoreResult<Vec<Entity>> {
        let filter = predicates.and_then(conjunction);
        Ok(shape(collection, filter.as_ref(), sorting, pagination))
    }

    fn get_relation(
        &mut self,
        entity: &Entity,
        relation: &RelationSpec,
        _dictionary: &EntityDictionary,
        filter: Option<&FilterExpression>,
        sorting: Option<&Sorting>,
        pagination: Option<&Pagination>,
    ) -> CoreResult<Relation> {
        let ids = entity.relationship(&relation.name);
        let related: Vec<Entity> = {
            let tables = self.tables.read();
            let table = tables
                .get(canonical(&self.aliases, &relation.class))
                .ok_or_else(|| CoreError::unknown_collection(relation.class.name()))?;
            ids.iter().filter_map(|id| table.get(id).cloned()).collect()
        };
        trace!(relation = %relation.name, found = related.len(), "resolved relation");

        let related = shape(related, filter, sorting, pagination);
        if relation.relationship_type.is_to_one() {
            Ok(Relation::ToOne(related.into_iter().next()))
        } else {
            Ok(Relation::ToMany(related))
        }
    }

    fn get_total_records(&mut self, class: &EntityClass) -> CoreResult<Option<u64>> {
        let tables = self.tables.read();
        let table = tables
            .get(canonical(&self.aliases, class))
            .ok_or_else(|| CoreError::unknown_collection(class.name()))?;
        Ok(Some(table.len() as u64))
    }

    fn flush(&mut self) -> CoreResult<()> {
        Ok(())
    }

    fn commit(&mut self) -> CoreResult<()> {
        let mut tables = self.tables.write();
        for write in self.pending.drain(..) {
            match write {
                Write::Save(mut entity) => {
                    let class = canonical(&self.aliases, entity.class()).clone();
                    let table = tables.entry(class).or_default();
                    if is_unset(entity.id()) {
                        entity.set_id(next_free_id(&self.sequence, Some(table)));
                    }
                    if let Some(id) = entity.id().cloned() {
                        table.insert(id, entity);
                    }
                }
                Write::Delete(class, id) => {
                    if let Some(table) = tables.get_mut(&class) {
                        table.remove(&id);
                    }
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) -> CoreResult<()> {
        self.pending.clear();
        Ok(())
    }
}

/// Filters, sorts and pages a collection.
fn shape(
    mut entities: Vec<Entity>,
    filter: Option<&FilterExpression>,
    sorting: Option<&Sorting>,
    pagination: Option<&Pagination>,
) -> Vec<Entity> {
    if let Some(filter) = filter {
        entities.retain(|entity| matches(entity, filter));
    }
    if let Some(sorting) = sorting.filter(|s| !s.is_empty()) {
        entities.sort_by(|a, b| {
            sorting
                .fields
                .iter()
                .map(|(path, order)| {
                    let ordering = compare(field(a, path).as_ref(), field(b, path).as_ref());
                    match order {
                        SortOrder::Asc => ordering,
                        SortOrder::Desc => ordering.reverse(),
                    }
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });
    }
    match pagination {
        Some(page) => entities
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect(),
        None => entities,
    }
}

/// Reads an attribute, treating `id` as the entity id.
fn field(entity: &Entity, path: &str) -> Option<Value> {
    if path == "id" {
        return entity.id().map(|id| Value::String(id.to_string()));
    }
    entity.attribute(path).cloned()
}

fn matches(entity: &Entity, filter: &FilterExpression) -> bool {
    match filter {
        FilterExpression::Predicate(predicate) => test(entity, predicate),
        FilterExpression::And(left, right) => matches(entity, left) && matches(entity, right),
        FilterExpression::Or(left, right) => matches(entity, left) || matches(entity, right),
        FilterExpression::Not(inner) => !matches(entity, inner),
    }
}

fn test(entity: &Entity, predicate: &Predicate) -> bool {
    let value = field(entity, &predicate.path).filter(|v| !v.is_null());
    let operand = predicate.values.first();

    match predicate.operator {
        Operator::IsNull => value.is_none(),
        Operator::NotNull => value.is_some(),
        Operator::In => value.is_some_and(|v| predicate.values.contains(&v)),
        Operator::NotIn => value.map_or(true, |v| !predicate.values.contains(&v)),
        Operator::Prefix => text_test(value.as_ref(), operand, |v, o| v.starts_with(o)),
        Operator::Infix => text_test(value.as_ref(), operand, |v, o| v.contains(o)),
        Operator::Postfix => text_test(value.as_ref(), operand, |v, o| v.ends_with(o)),
        Operator::Lt => order_test(value.as_ref(), operand, Ordering::is_lt),
        Operator::Le => order_test(value.as_ref(), operand, Ordering::is_le),
        Operator::Gt => order_test(value.as_ref(), operand, Ordering::is_gt),
        Operator::Ge => order_test(value.as_ref(), operand, Ordering::is_ge),
    }
}

fn text_test(value: Option<&Value>, operand: Option<&Value>, op: fn(&str, &str) -> bool) -> bool {
    match (value.and_then(Value::as_str), operand.and_then(Value::as_str)) {
        (Some(value), Some(operand)) => op(value, operand),
        _ => false,
    }
}

fn order_test(value: Option<&Value>, operand: Option<&Value>, op: fn(Ordering) -> bool) -> bool {
    match (value, operand) {
        (Some(value), Some(operand)) => op(compare(Some(value), Some(operand))),
        _ => false,
    }
}

/// Orders JSON values: absent first, then numbers, then strings, then
/// everything else by its serialized form.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Number(_), _) => Ordering::Less,
            (_, Value::Number(_)) => Ordering::Greater,
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}
