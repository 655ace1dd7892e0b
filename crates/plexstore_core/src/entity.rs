//! Entity records and relationships.

use crate::types::{EntityClass, EntityId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An entity instance as seen by data stores.
///
/// An entity carries its runtime class, an optional id (unset until a store
/// assigns one), JSON attributes and named relationships holding the ids of
/// related entities.
///
/// ```
/// use plexstore_core::{Entity, EntityClass};
/// use serde_json::json;
///
/// let book = Entity::new(EntityClass::new("book"))
///     .with_id("1")
///     .with_attribute("title", json!("Dune"))
///     .with_relationship("authors", ["7"]);
/// assert_eq!(book.attribute("title"), Some(&json!("Dune")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    class: EntityClass,
    id: Option<EntityId>,
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
    #[serde(default)]
    relationships: BTreeMap<String, Vec<EntityId>>,
}

impl Entity {
    /// Creates an empty entity of the given runtime class.
    #[must_use]
    pub fn new(class: EntityClass) -> Self {
        Self {
            class,
            id: None,
            attributes: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Sets a relationship to the given ids.
    #[must_use]
    pub fn with_relationship<I, T>(mut self, name: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityId>,
    {
        self.relationships
            .insert(name.into(), ids.into_iter().map(Into::into).collect());
        self
    }

    /// Returns the runtime class.
    #[must_use]
    pub fn class(&self) -> &EntityClass {
        &self.class
    }

    /// Returns the id, if assigned.
    #[must_use]
    pub fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    /// Assigns the id.
    pub fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    /// Returns an attribute value.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Sets an attribute value, returning the previous one.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.attributes.insert(name.into(), value)
    }

    /// Returns all attributes.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Returns the ids held by a relationship.
    #[must_use]
    pub fn relationship(&self, name: &str) -> &[EntityId] {
        self.relationships
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Replaces the ids held by a relationship.
    pub fn set_relationship(&mut self, name: impl Into<String>, ids: Vec<EntityId>) {
        self.relationships.insert(name.into(), ids);
    }
}

/// Cardinality of a relationship between two entity classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    /// Not a relationship.
    None,
    /// One-to-one.
    OneToOne,
    /// One-to-many.
    OneToMany,
    /// Many-to-one.
    ManyToOne,
    /// Many-to-many.
    ManyToMany,
}

impl RelationshipType {
    /// Returns true if the far side holds many entities.
    #[must_use]
    pub fn is_to_many(self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }

    /// Returns true if the far side holds at most one entity.
    #[must_use]
    pub fn is_to_one(self) -> bool {
        matches!(self, Self::OneToOne | Self::ManyToOne)
    }
}

/// The value of a relationship computed by a data store.
#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    /// A to-one relationship.
    ToOne(Option<Entity>),
    /// A to-many relationship.
    ToMany(Vec<Entity>),
}

impl Relation {
    /// Returns references to the related entities.
    #[must_use]
    pub fn entities(&self) -> Vec<&Entity> {
        match self {
            Self::ToOne(entity) => entity.iter().collect(),
            Self::ToMany(entities) => entities.iter().collect(),
        }
    }
}
