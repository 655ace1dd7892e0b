//! Multiplexer configuration.

/// What to do when two stores declare the same entity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateBindingPolicy {
    /// Fail the registry build.
    Reject,
    /// Route the class to the store registered last.
    LastWins,
}

/// Configuration for building a store registry.
#[derive(Debug, Clone)]
pub struct MultiplexConfig {
    /// How conflicting class declarations are resolved.
    pub duplicate_bindings: DuplicateBindingPolicy,

    /// Whether dropping an unclosed transaction closes its sub-transactions.
    pub close_on_drop: bool,
}

impl Default for MultiplexConfig {
    fn default() -> Self {
        Self {
            duplicate_bindings: DuplicateBindingPolicy::Reject,
            close_on_drop: true,
        }
    }
}

impl MultiplexConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the duplicate binding policy.
    #[must_use]
    pub const fn duplicate_bindings(mut self, policy: DuplicateBindingPolicy) -> Self {
        self.duplicate_bindings = policy;
        self
    }

    /// Sets whether dropped transactions are closed.
    #[must_use]
    pub const fn close_on_drop(mut self, value: bool) -> Self {
        self.close_on_drop = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = MultiplexConfig::default();
        assert_eq!(config.duplicate_bindings, DuplicateBindingPolicy::Reject);
        assert!(config.close_on_drop);
    }

    #[test]
    fn builder_pattern() {
        let config = MultiplexConfig::new()
            .duplicate_bindings(DuplicateBindingPolicy::LastWins)
            .close_on_drop(false);

        assert_eq!(config.duplicate_bindings, DuplicateBindingPolicy::LastWins);
        assert!(!config.close_on_drop);
    }
}
