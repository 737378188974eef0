//! Role-based access check for protected commands

use super::types::UserIdentity;

/// Outcome of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    /// Nobody is logged in
    Unauthenticated,
    /// Logged in, but none of the required roles
    Forbidden,
}

/// Decide whether `identity` may use something guarded by `required_roles`.
///
/// An empty role list only requires a login.
pub fn authorize(identity: Option<&UserIdentity>, required_roles: &[&str]) -> Access {
    let Some(identity) = identity else {
        return Access::Unauthenticated;
    };

    if required_roles.is_empty() || required_roles.iter().any(|r| identity.has_role(r)) {
        Access::Granted
    } else {
        Access::Forbidden
    }
}
