//! Domain model for application users and instance settings.

use serde::{Deserialize, Serialize};

use crate::constants::roles;

/// User record as seen by the rest of the crate. The password hash never
/// leaves the repository layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Administrator,
    Regular,
}

impl Role {
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            roles::ADMINISTRATOR => Some(Self::Administrator),
            roles::REGULAR => Some(Self::Regular),
            _ => None,
        }
    }

    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Administrator => roles::ADMINISTRATOR,
            Self::Regular => roles::REGULAR,
        }
    }
}

/// Instance-wide settings consulted by the user-creation policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub authentication_method: AuthenticationMethod,

    /// Minimum password length enforced by the strength check.
    pub required_password_length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticationMethod {
    Internal,
    Ldap,
    Oauth,
}

impl AuthenticationMethod {
    /// External providers own credentials; internal users carry a hash.
    #[must_use]
    pub const fn is_external(self) -> bool {
        matches!(self, Self::Ldap | Self::Oauth)
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "internal" => Some(Self::Internal),
            "ldap" => Some(Self::Ldap),
            "oauth" => Some(Self::Oauth),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Ldap => "ldap",
            Self::Oauth => "oauth",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_codes_round_trip() {
        assert_eq!(Role::from_code(1), Some(Role::Administrator));
        assert_eq!(Role::from_code(2), Some(Role::Regular));
        assert_eq!(Role::from_code(3), None);
        assert_eq!(Role::Administrator.code(), 1);
    }

    #[test]
    fn external_methods() {
        assert!(!AuthenticationMethod::Internal.is_external());
        assert!(AuthenticationMethod::Ldap.is_external());
        assert!(AuthenticationMethod::Oauth.is_external());
        assert_eq!(AuthenticationMethod::parse("ldap"), Some(AuthenticationMethod::Ldap));
        assert_eq!(AuthenticationMethod::parse("saml"), None);
    }
}
