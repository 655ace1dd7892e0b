//! Entity dictionary.
//!
//! The dictionary records which entity classes are declared and how runtime
//! classes (proxies, subclasses, generated implementations) map back to the
//! declared class they stand for.

use crate::types::EntityClass;
use std::collections::{HashMap, HashSet};

/// Binding table of declared entity classes.
#[derive(Debug, Clone, Default)]
pub struct EntityDictionary {
    /// Declared classes in binding order.
    bindings: Vec<EntityClass>,
    /// Fast membership check over `bindings`.
    bound: HashSet<EntityClass>,
    /// Runtime class -> declared class.
    aliases: HashMap<EntityClass, EntityClass>,
}

impl EntityDictionary {
    /// Creates an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an entity class. Binding an already bound class is a no-op.
    pub fn bind_entity(&mut self, class: EntityClass) {
        if self.bound.insert(class.clone()) {
            self.bindings.push(class);
        }
    }

    /// Records that `runtime` instances are instances of the declared class
    /// `canonical`.
    pub fn bind_alias(&mut self, runtime: EntityClass, canonical: EntityClass) {
        self.aliases.insert(runtime, canonical);
    }

    /// Returns true if the class is declared.
    #[must_use]
    pub fn is_bound(&self, class: &EntityClass) -> bool {
        self.bound.contains(class)
    }

    /// Resolves the declared entity class for a runtime class.
    ///
    /// Returns the class itself when it is declared, its canonical class when
    /// it is a known alias of a declared class, and `None` otherwise.
    #[must_use]
    pub fn lookup_entity_class(&self, class: &EntityClass) -> Option<EntityClass> {
        if self.is_bound(class) {
            return Some(class.clone());
        }
        self.aliases
            .get(class)
            .filter(|canonical| self.is_bound(canonical))
            .cloned()
    }

    /// Returns the declared classes in binding order.
    pub fn bindings(&self) -> impl Iterator<Item = &EntityClass> {
        self.bindings.iter()
    }

    /// Returns all recorded aliases.
    pub fn aliases(&self) -> impl Iterator<Item = (&EntityClass, &EntityClass)> {
        self.aliases.iter()
    }

    /// Returns the number of declared classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if no class is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_class_resolves_to_itself() {
        let mut dict = EntityDictionary::new();
        dict.bind_entity(EntityClass::new("book"));

        assert_eq!(
            dict.lookup_entity_class(&EntityClass::new("book")),
            Some(EntityClass::new("book"))
        );
    }

    #[test]
    fn alias_resolves_to_canonical() {
        let mut dict = EntityDictionary::new();
        dict.bind_entity(EntityClass::new("book"));
        dict.bind_alias(EntityClass::new("BookProxy"), EntityClass::new("book"));

        assert_eq!(
            dict.lookup_entity_class(&EntityClass::new("BookProxy")),
            Some(EntityClass::new("book"))
        );
    }

    #[test]
    fn alias_to_undeclared_class_is_unresolved() {
        let mut dict = EntityDictionary::new();
        dict.bind_alias(EntityClass::new("Ghost"), EntityClass::new("phantom"));

        assert!(dict.lookup_entity_class(&EntityClass::new("Ghost")).is_none());
        assert!(dict.lookup_entity_class(&EntityClass::new("nothing")).is_none());
    }

    #[test]
    fn rebinding_keeps_order_and_count() {
        let mut dict = EntityDictionary::new();
        dict.bind_entity(EntityClass::new("b"));
        dict.bind_entity(EntityClass::new("a"));
        dict.bind_entity(EntityClass::new("b"));

        let names: Vec<_> = dict.bindings().map(EntityClass::name).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(dict.len(), 2);
        assert!(!dict.is_empty());
    }
}
