use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// The authenticated user behind a request, as supplied by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: UserId,
    pub email: Option<String>,
}

impl Caller {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            email: None,
        }
    }

    pub fn with_email(user_id: UserId, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: Some(email.into()),
        }
    }

    /// True if this caller owns a record with the given owner id.
    pub fn owns(&self, owner_id: UserId) -> bool {
        self.user_id == owner_id
    }
}

/// Session lookup. `None` means the request is unauthenticated.
pub trait IdentityProvider {
    fn current_caller(&self) -> Option<Caller>;
}

/// Fixed identity, used by the command line front end and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    caller: Option<Caller>,
}

impl StaticIdentity {
    pub fn signed_in(caller: Caller) -> Self {
        Self {
            caller: Some(caller),
        }
    }

    pub fn anonymous() -> Self {
        Self { caller: None }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_caller(&self) -> Option<Caller> {
        self.caller.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_is_by_user_id() {
        let owner = UserId::new();
        let caller = Caller::with_email(owner, "agent@example.com");
        assert!(caller.owns(owner));
        assert!(!caller.owns(UserId::new()));
    }

    #[test]
    fn anonymous_identity_has_no_caller() {
        assert!(StaticIdentity::anonymous().current_caller().is_none());
        let caller = Caller::new(UserId::new());
        assert_eq!(
            StaticIdentity::signed_in(caller.clone()).current_caller(),
            Some(caller)
        );
    }
}
