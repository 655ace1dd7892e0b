//! # PlexStore Multiplex
//!
//! Coordinates one logical transaction across several data stores.
//!
//! Each entity class is owned by exactly one registered store. A
//! [`MultiplexTransaction`] opens one sub-transaction per store, routes every
//! entity-scoped call to the store owning the entity's class and drives the
//! flush, pre-commit, commit and close phases across all of them in
//! registration order.
//!
//! ## Example
//!
//! ```rust,ignore
//! use plexstore_multiplex::MultiplexManager;
//! use std::sync::Arc;
//!
//! let manager = MultiplexManager::builder()
//!     .store(Arc::new(users_store))
//!     .store(Arc::new(orders_store))
//!     .build()?;
//!
//! let mut txn = manager.begin()?;
//! let user = txn.create_object(&"user".into())?;
//! txn.save(&user)?;
//! txn.commit()?;
//! txn.close()?;
//! ```
//!
//! ## Non-atomicity
//!
//! Commit is sequential. If a later store fails to commit, stores that
//! already committed are not rolled back.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod manager;
mod registry;
mod transaction;

pub use config::{DuplicateBindingPolicy, MultiplexConfig};
pub use manager::{MultiplexManager, MultiplexManagerBuilder};
pub use registry::{StoreRegistry, StoreRegistryBuilder};
pub use transaction::{MultiplexTransaction, TransactionMode, TransactionState};
