//! Caller identities and the administrator gate.
//!
//! Identities are opaque and compared for equality only. How a caller
//! proved its identity is the transport's business, not ours.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// An authenticated caller identity (account address, user id, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Principal {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The single identity allowed to run privileged operations.
///
/// Fixed at construction; nothing in the registry or ledger can change it.
#[derive(Debug, Clone)]
pub struct Administrator {
    principal: Principal,
}

impl Administrator {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn is(&self, caller: &Principal) -> bool {
        &self.principal == caller
    }

    /// Returns `Ok(())` if `caller` is the administrator, `Unauthorized`
    /// otherwise. `action` names the attempted operation for the message.
    pub fn check(&self, caller: &Principal, action: &str) -> Result<(), ServiceError> {
        if self.is(caller) {
            Ok(())
        } else {
            Err(ServiceError::Unauthorized(format!(
                "{} may not {}: administrator only",
                caller, action
            )))
        }
    }
}
