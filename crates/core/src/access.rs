use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Capability resolved once at the boundary and threaded into every mutating
/// operation. The core never looks up the current user on its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub actor: String,
    pub can_manage: bool,
}

impl AccessGrant {
    pub fn manager(actor: impl Into<String>) -> Self {
        Self { actor: actor.into(), can_manage: true }
    }

    pub fn read_only(actor: impl Into<String>) -> Self {
        Self { actor: actor.into(), can_manage: false }
    }

    pub fn require_manage(&self) -> Result<(), DomainError> {
        if self.can_manage {
            Ok(())
        } else {
            Err(DomainError::Forbidden { actor: self.actor.clone() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AccessGrant;
    use crate::errors::DomainError;

    #[test]
    fn read_only_grant_is_rejected_for_mutations() {
        let error = AccessGrant::read_only("viewer").require_manage().expect_err("forbidden");
        assert_eq!(error, DomainError::Forbidden { actor: "viewer".to_string() });
        assert!(AccessGrant::manager("buyer").require_manage().is_ok());
    }
}
