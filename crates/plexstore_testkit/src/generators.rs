//! Property-based test generators using proptest.

use plexstore_core::EntityClass;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Strategy for generating entity class names.
pub fn class_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating a set of distinct entity classes.
pub fn class_set_strategy(max: usize) -> impl Strategy<Value = Vec<EntityClass>> {
    prop::collection::btree_set(class_name_strategy(), 1..=max.max(1))
        .prop_map(|names: BTreeSet<String>| names.into_iter().map(EntityClass::new).collect())
}

/// Strategy for distributing distinct classes over `stores` stores.
///
/// Yields one class list per store. Every class appears exactly once; a
/// store may own no class at all.
pub fn partition_strategy(
    stores: usize,
    max_classes: usize,
) -> impl Strategy<Value = Vec<Vec<EntityClass>>> {
    let stores = stores.max(1);
    class_set_strategy(max_classes).prop_flat_map(move |classes| {
        let len = classes.len();
        prop::collection::vec(0..stores, len).prop_map(move |owners| {
            let mut partition = vec![Vec::new(); stores];
            for (class, owner) in classes.iter().zip(owners) {
                partition[owner].push(class.clone());
            }
            partition
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn partition_places_each_class_once(partition in partition_strategy(3, 8)) {
            prop_assert_eq!(partition.len(), 3);
            let all: Vec<_> = partition.iter().flatten().collect();
            let distinct: BTreeSet<_> = all.iter().collect();
            prop_assert_eq!(all.len(), distinct.len());
            prop_assert!(!all.is_empty());
        }
    }
}
