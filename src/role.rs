//! Which side of the exchange this endpoint plays.
use std::fmt;

/// The role of an endpoint in one key exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Allocates the key handle and sends it first.
    Initiator,
    /// Binds to the handle received from the initiator and echoes it back.
    Responder,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiator => f.write_str("initiator"),
            Self::Responder => f.write_str("responder"),
        }
    }
}

/// Answers "am I the initiator or the responder" for the handshake being driven.
///
/// Only the hosting handshake knows the answer, so it is injected rather than decided
/// here. `None` means the role cannot be determined and fails the exchange.
pub trait RoleResolver: Send + Sync {
    /// Resolve the role. Must not have side effects.
    fn resolve_role(&self) -> Option<Role>;
}

impl RoleResolver for Role {
    fn resolve_role(&self) -> Option<Role> {
        Some(*self)
    }
}

impl<F> RoleResolver for F
where
    F: Fn() -> Option<Role> + Send + Sync,
{
    fn resolve_role(&self) -> Option<Role> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_and_closure_resolvers() {
        assert_eq!(Role::Responder.resolve_role(), Some(Role::Responder));
        let undecided = || -> Option<Role> { None };
        assert_eq!(undecided.resolve_role(), None);
        let is_server = true;
        let from_host = move || Some(if is_server { Role::Initiator } else { Role::Responder });
        assert_eq!(from_host.resolve_role(), Some(Role::Initiator));
    }
}
