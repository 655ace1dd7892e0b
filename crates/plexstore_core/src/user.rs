//! Caller identity.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A caller identity passed through data store transactions.
///
/// The wrapped token is opaque to PlexStore; stores downcast it with
/// [`User::opaque`] and may attach roles they resolve for it. Cloning a
/// `User` shares the token.
///
/// ```
/// use plexstore_core::User;
///
/// let user = User::new(String::from("alice")).with_role("admin");
/// assert_eq!(user.opaque::<String>().map(String::as_str), Some("alice"));
/// assert!(user.has_role("admin"));
/// ```
#[derive(Clone)]
pub struct User {
    opaque: Arc<dyn Any + Send + Sync>,
    roles: BTreeSet<String>,
}

impl User {
    /// Wraps an opaque identity token.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(opaque: T) -> Self {
        Self {
            opaque: Arc::new(opaque),
            roles: BTreeSet::new(),
        }
    }

    /// Wraps an already shared identity token.
    #[must_use]
    pub fn from_shared(opaque: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            opaque,
            roles: BTreeSet::new(),
        }
    }

    /// Returns the token if it is a `T`.
    #[must_use]
    pub fn opaque<T: Any>(&self) -> Option<&T> {
        self.opaque.downcast_ref::<T>()
    }

    /// Returns the shared token.
    #[must_use]
    pub fn opaque_shared(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.opaque
    }

    /// Returns true if both users wrap the very same token.
    #[must_use]
    pub fn same_identity(&self, other: &User) -> bool {
        Arc::ptr_eq(&self.opaque, &other.opaque)
    }

    /// Adds a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Returns true if the user holds the role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Returns the roles in sorted order.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_to_wrong_type_is_none() {
        let user = User::new(42_u32);
        assert_eq!(user.opaque::<u32>(), Some(&42));
        assert!(user.opaque::<String>().is_none());
    }

    #[test]
    fn clones_share_identity() {
        let user = User::new("token");
        let enriched = user.clone().with_role("reader");

        assert!(user.same_identity(&enriched));
        assert!(!user.same_identity(&User::new("token")));
        assert!(enriched.has_role("reader"));
        assert!(!user.has_role("reader"));
    }

    #[test]
    fn roles_are_sorted() {
        let user = User::new(()).with_role("b").with_role("a");
        let roles: Vec<_> = user.roles().collect();
        assert_eq!(roles, ["a", "b"]);
    }
}
