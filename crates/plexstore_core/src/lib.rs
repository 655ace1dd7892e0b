//! # PlexStore Core
//!
//! Contracts shared by PlexStore data stores.
//!
//! This crate provides:
//! - The [`DataStore`] and [`DataStoreTransaction`] traits every backing store
//!   implements
//! - The entity record model ([`Entity`], [`EntityClass`], [`EntityId`])
//! - The [`EntityDictionary`] used to canonicalize runtime entity classes
//! - Filter, sorting and pagination descriptors
//! - Caller identity ([`User`]) and request context ([`RequestScope`])
//! - The error type, including aggregated close failures

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod dictionary;
mod entity;
mod error;
mod query;
mod request;
mod store;
mod types;
mod user;

pub use dictionary::EntityDictionary;
pub use entity::{Entity, Relation, RelationshipType};
pub use error::{CloseFailure, CoreError, CoreResult, FailureAccumulator};
pub use query::{FilterExpression, FilterScope, Operator, Pagination, Predicate, SortOrder, Sorting};
pub use request::RequestScope;
pub use store::{conjunction, DataStore, DataStoreTransaction, RelationSpec};
pub use types::{EntityClass, EntityId, StoreId};
pub use user::User;
