//! Multiplex transaction state.

use std::fmt;

/// Lifecycle state of a multiplex transaction.
///
/// States are ordered; a transaction only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransactionState {
    /// Sub-transactions are open and accept operations.
    Open,
    /// Every sub-transaction has been flushed at least once.
    Flushed,
    /// Every sub-transaction has passed pre-commit.
    PreCommitted,
    /// Every sub-transaction has committed.
    Committed,
    /// Every sub-transaction has been closed and released.
    Closed,
}

impl TransactionState {
    /// Returns the later of the two states.
    #[must_use]
    pub fn advance(self, next: TransactionState) -> TransactionState {
        self.max(next)
    }

    /// Returns true once the transaction has been closed.
    #[must_use]
    pub fn is_closed(self) -> bool {
        self == TransactionState::Closed
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Flushed => "flushed",
            Self::PreCommitted => "pre-committed",
            Self::Committed => "committed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Whether a multiplex transaction may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionMode {
    /// Reads only; writes are rejected before routing.
    Read,
    /// Reads and writes.
    Write,
}
