//! Requester identity for mutating endpoints.
//!
//! Tokens are issued elsewhere; this crate only verifies HS256 bearer tokens
//! and exposes the identity (`{id, username, role}`) to handlers through the
//! [`AuthUser`] extractor.

pub mod extract;
pub mod token;

use serde::{Deserialize, Serialize};

pub use extract::AuthUser;
pub use token::{AuthError, Claims, TokenVerifier};

/// Role carried in the token. Anything other than `admin` is a regular user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    #[serde(other)]
    User,
}

/// Verified identity of the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl Identity {
    /// True when this identity is the owner referenced by `owner_id`.
    pub fn owns(&self, owner_id: i64) -> bool {
        self.id == owner_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_roles_fall_back_to_user() {
        let role: Role = serde_json::from_str("\"editor\"").unwrap();
        assert_eq!(role, Role::User);
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn ownership_compares_ids() {
        let identity = Identity {
            id: 7,
            username: "ana".to_string(),
            role: Role::User,
        };
        assert!(identity.owns(7));
        assert!(!identity.owns(8));
    }
}
