//! Error types for PlexStore.

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Result type for data store operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in data store and transaction operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No data store owns the requested entity type.
    #[error("unknown entity collection: {name}")]
    UnknownEntityCollection {
        /// Best available name of the entity type.
        name: String,
    },

    /// An entity class was declared by more than one data store.
    #[error("entity class {class} is bound to both {first} and {second}")]
    DuplicateBinding {
        /// The conflicting entity class.
        class: String,
        /// The store that declared the class first.
        first: String,
        /// The store that declared it again.
        second: String,
    },

    /// The same data store instance was registered twice.
    #[error("data store registered twice at position {position}")]
    DuplicateStore {
        /// Registration position of the second registration.
        position: usize,
    },

    /// Entity not found.
    #[error("entity {id} not found in collection {class}")]
    EntityNotFound {
        /// The entity class searched.
        class: String,
        /// The id that was not found.
        id: String,
    },

    /// A write was attempted through a read-only transaction.
    #[error("transaction is read-only: {operation} not permitted")]
    ReadOnlyTransaction {
        /// The rejected operation.
        operation: &'static str,
    },

    /// The transaction has already been closed.
    #[error("transaction is closed")]
    TransactionClosed,

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// A backing store reported a failure of its own.
    #[error("store error: {message}")]
    Store {
        /// Description supplied by the store.
        message: String,
    },

    /// One or more sub-transactions failed to close.
    #[error(transparent)]
    Close(#[from] CloseFailure),
}

impl CoreError {
    /// Creates an unknown entity collection error.
    pub fn unknown_collection(name: impl Into<String>) -> Self {
        Self::UnknownEntityCollection { name: name.into() }
    }

    /// Creates an entity not found error.
    pub fn entity_not_found(class: impl Into<String>, id: impl Into<String>) -> Self {
        Self::EntityNotFound {
            class: class.into(),
            id: id.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Returns true if this is a routing failure.
    #[must_use]
    pub fn is_unknown_collection(&self) -> bool {
        matches!(self, Self::UnknownEntityCollection { .. })
    }
}

/// Aggregated failure of a multi-resource close.
///
/// The first failure encountered is the primary cause. Every later failure
/// is kept, in order, as a suppressed cause.
#[derive(Debug)]
pub struct CloseFailure {
    primary: Box<CoreError>,
    suppressed: Vec<CoreError>,
}

impl CloseFailure {
    /// Creates a failure with the given primary cause.
    #[must_use]
    pub fn new(primary: CoreError) -> Self {
        Self {
            primary: Box::new(primary),
            suppressed: Vec::new(),
        }
    }

    /// Records a secondary failure.
    pub fn add_suppressed(&mut self, error: CoreError) {
        self.suppressed.push(error);
    }

    /// Returns the primary cause.
    #[must_use]
    pub fn primary(&self) -> &CoreError {
        &self.primary
    }

    /// Returns the suppressed causes in the order they occurred.
    #[must_use]
    pub fn suppressed(&self) -> &[CoreError] {
        &self.suppressed
    }

    /// Iterates over every recorded failure, primary first.
    pub fn causes(&self) -> impl Iterator<Item = &CoreError> {
        std::iter::once(self.primary.as_ref()).chain(self.suppressed.iter())
    }

    /// Returns the total number of recorded failures.
    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.suppressed.len()
    }

    /// Always false; a close failure holds at least its primary cause.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Splits the failure into its primary and suppressed causes.
    #[must_use]
    pub fn into_parts(self) -> (CoreError, Vec<CoreError>) {
        (*self.primary, self.suppressed)
    }
}

impl fmt::Display for CloseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "close failed: {}", self.primary)?;
        if !self.suppressed.is_empty() {
            write!(f, " ({} suppressed)", self.suppressed.len())?;
        }
        Ok(())
    }
}

impl StdError for CloseFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.primary.as_ref())
    }
}

/// Accumulates failures from a sequence of close attempts.
///
/// ```
/// use plexstore_core::{CoreError, FailureAccumulator};
///
/// let mut failures = FailureAccumulator::new();
/// failures.record(Ok(()));
/// failures.record(Err(CoreError::store("disk gone")));
/// assert!(failures.finish().is_err());
/// ```
#[derive(Debug, Default)]
pub struct FailureAccumulator {
    failure: Option<CloseFailure>,
}

impl FailureAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one close attempt.
    pub fn record(&mut self, outcome: CoreResult<()>) {
        if let Err(error) = outcome {
            match self.failure.as_mut() {
                Some(failure) => failure.add_suppressed(error),
                None => self.failure = Some(CloseFailure::new(error)),
            }
        }
    }

    /// Returns true if no failure has been recorded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failure.is_none()
    }

    /// Surfaces the aggregated failure, if any.
    pub fn finish(self) -> CoreResult<()> {
        match self.failure {
            Some(failure) => Err(CoreError::Close(failure)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_collection_display() {
        let err = CoreError::unknown_collection("widget");
        assert_eq!(err.to_string(), "unknown entity collection: widget");
        assert!(err.is_unknown_collection());
    }

    #[test]
    fn accumulator_without_failures_is_ok() {
        let mut acc = FailureAccumulator::new();
        acc.record(Ok(()));
        acc.record(Ok(()));
        assert!(acc.is_clean());
        assert!(acc.finish().is_ok());
    }

    #[test]
    fn first_failure_is_primary() {
        let mut acc = FailureAccumulator::new();
        acc.record(Err(CoreError::store("first")));
        acc.record(Ok(()));
        acc.record(Err(CoreError::store("second")));
        acc.record(Err(CoreError::TransactionClosed));

        let Err(CoreError::Close(failure)) = acc.finish() else {
            panic!("expected close failure");
        };
        assert!(matches!(failure.primary(), CoreError::Store { message } if message == "first"));
        assert_eq!(failure.suppressed().len(), 2);
        assert_eq!(failure.len(), 3);
        assert!(matches!(failure.suppressed()[1], CoreError::TransactionClosed));
    }

    #[test]
    fn close_failure_source_is_primary() {
        let failure = CloseFailure::new(CoreError::store("boom"));
        let source = failure.source().expect("source");
        assert_eq!(source.to_string(), "store error: boom");
        assert_eq!(failure.to_string(), "close failed: store error: boom");
    }

    #[test]
    fn causes_iterate_in_order() {
        let mut failure = CloseFailure::new(CoreError::store("a"));
        failure.add_suppressed(CoreError::store("b"));
        let messages: Vec<_> = failure.causes().map(ToString::to_string).collect();
        assert_eq!(messages, ["store error: a", "store error: b"]);
        assert!(failure.to_string().ends_with("(1 suppressed)"));
    }
}
