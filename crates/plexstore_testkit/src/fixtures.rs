//! Test fixtures.
//!
//! Log setup plus a small library domain used across tests: authors live in
//! one store, books and publishers in another.

use plexstore_core::{Entity, EntityClass, RelationSpec, RelationshipType};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber writing through the test harness.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`. Safe to call from
/// every test; only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// The `author` class.
#[must_use]
pub fn author_class() -> EntityClass {
    EntityClass::new("author")
}

/// The `book` class.
#[must_use]
pub fn book_class() -> EntityClass {
    EntityClass::new("book")
}

/// The `publisher` class.
#[must_use]
pub fn publisher_class() -> EntityClass {
    EntityClass::new("publisher")
}

/// An author with the given id and name.
#[must_use]
pub fn author(id: &str, name: &str) -> Entity {
    Entity::new(author_class())
        .with_id(id)
        .with_attribute("name", json!(name))
}

/// A book with the given id and title.
#[must_use]
pub fn book(id: &str, title: &str) -> Entity {
    Entity::new(book_class())
        .with_id(id)
        .with_attribute("title", json!(title))
}

/// The `books` relationship of an author.
#[must_use]
pub fn books_of_author() -> RelationSpec {
    RelationSpec::new(RelationshipType::OneToMany, "books", book_class())
}
