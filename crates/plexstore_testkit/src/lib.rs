//! # PlexStore Testkit
//!
//! Test utilities for PlexStore.
//!
//! This crate provides:
//! - [`RecordingStore`], a data store that logs every call into a [`CallLog`]
//!   and can be told to fail selected phases
//! - [`MemoryStore`], a small in-memory data store
//! - Fixtures for a library domain and log setup
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use plexstore_testkit::prelude::*;
//!
//! #[test]
//! fn commit_reaches_every_store() {
//!     init_tracing();
//!     let log = CallLog::new();
//!     let store = RecordingStore::new("alpha", &log).owning("author");
//!     // ... register the store and run a transaction
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod memory;
pub mod recording;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::memory::*;
    pub use crate::recording::*;
}

pub use fixtures::*;
pub use generators::*;
pub use memory::MemoryStore;
pub use recording::{Call, CallLog, CallRecord, Fault, RecordingStore};
