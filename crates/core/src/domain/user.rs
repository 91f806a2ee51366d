use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Roles are ordered: an actor satisfies a requirement when its rank is at
/// least the required rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Manager,
    Admin,
}

impl Role {
    pub fn rank(self) -> u8 {
        match self {
            Role::User => 1,
            Role::Manager => 2,
            Role::Admin => 3,
        }
    }

    pub fn satisfies(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::Validation(format!(
                "unknown role `{other}` (expected user|manager|admin)"
            ))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user profile. The password hash lives in the user store and is never
/// part of this type, so profiles are always safe to serialize.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub department: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input shape for user creation, before an id and password hash exist.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
    pub department: String,
}

fn default_role() -> Role {
    Role::User
}

impl NewUser {
    /// Trims free-text fields and checks the constraints the user schema
    /// requires: username >= 3 chars, password >= 8 chars, an email that at
    /// least looks like one, and a non-empty department.
    pub fn validate(&mut self) -> Result<(), DomainError> {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_string();
        self.department = self.department.trim().to_string();

        if self.username.chars().count() < 3 {
            return Err(DomainError::Validation(
                "username must be at least 3 characters".to_string(),
            ));
        }
        if self.password.chars().count() < 8 {
            return Err(DomainError::Validation(
                "password must be at least 8 characters".to_string(),
            ));
        }
        if !self.email.contains('@') {
            return Err(DomainError::Validation("email is not valid".to_string()));
        }
        if self.department.is_empty() {
            return Err(DomainError::Validation("department is required".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{NewUser, Role};

    fn new_user() -> NewUser {
        NewUser {
            username: "jdoe".to_string(),
            password: "correct horse".to_string(),
            email: "jdoe@example.com".to_string(),
            role: Role::User,
            department: "Marketing".to_string(),
        }
    }

    #[test]
    fn role_ordering_is_user_manager_admin() {
        assert!(Role::Admin.satisfies(Role::Manager));
        assert!(Role::Manager.satisfies(Role::Manager));
        assert!(!Role::User.satisfies(Role::Manager));
        assert!(Role::Admin.satisfies(Role::User));
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Manager".parse::<Role>().expect("parse"), Role::Manager);
        assert!("supervisor".parse::<Role>().is_err());
    }

    #[test]
    fn validate_trims_and_accepts_well_formed_input() {
        let mut user = new_user();
        user.department = "  Marketing  ".to_string();
        user.validate().expect("valid user");
        assert_eq!(user.department, "Marketing");
    }

    #[test]
    fn validate_rejects_short_username() {
        let mut user = new_user();
        user.username = "jd".to_string();
        assert!(user.validate().is_err());
    }

    #[test]
    fn validate_rejects_short_password() {
        let mut user = new_user();
        user.password = "short".to_string();
        assert!(user.validate().is_err());
    }

    #[test]
    fn validate_rejects_mail_without_at_sign() {
        let mut user = new_user();
        user.email = "not-an-email".to_string();
        assert!(user.validate().is_err());
    }
}
