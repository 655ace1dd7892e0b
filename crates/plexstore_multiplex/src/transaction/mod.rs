//! Multiplexed transactions.
//!
//! A multiplex transaction opens one sub-transaction per registered store and
//! dispatches every call to the sub-transaction owning the entity class
//! involved. It coordinates the lifecycle of all of them but offers no
//! atomicity across stores: a failed commit in one store does not undo the
//! commits that already went through in others.

mod multiplex;
mod state;

pub use multiplex::MultiplexTransaction;
pub use state::{TransactionMode, TransactionState};
