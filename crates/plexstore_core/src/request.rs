//! Per-request context.

use crate::user::User;
use uuid::Uuid;

/// Context of the request a transaction serves.
///
/// Request-scoped transactions receive it through
/// [`DataStoreTransaction::set_request_scope`](crate::DataStoreTransaction::set_request_scope).
#[derive(Debug, Clone)]
pub struct RequestScope {
    request_id: Uuid,
    user: Option<User>,
}

impl RequestScope {
    /// Creates a scope with a fresh request id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            user: None,
        }
    }

    /// Sets the user the request runs as.
    #[must_use]
    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    /// Returns the request id.
    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Returns the user, if known.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}
