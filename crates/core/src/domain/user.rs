use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ApplicationError, DomainError};
use crate::password::PasswordDigest;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Username(String);

impl Username {
    /// Usernames are stored and compared lower-cased.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(DomainError::InvariantViolation("username must not be empty".to_string()));
        }
        if normalized.chars().any(char::is_whitespace) {
            return Err(DomainError::InvariantViolation(
                "username must not contain whitespace".to_string(),
            ));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        let valid = match trimmed.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && !domain.is_empty() && !trimmed.contains(char::is_whitespace)
            }
            None => false,
        };
        if !valid {
            return Err(DomainError::InvariantViolation(format!(
                "`{trimmed}` is not a valid email address"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub username: Username,
    pub email: Email,
    pub password: PasswordDigest,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn register(
        username: &str,
        email: &str,
        password: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if password.is_empty() {
            return Err(DomainError::InvariantViolation("password must not be empty".to_string()));
        }
        Ok(Self {
            username: Username::parse(username)?,
            email: Email::parse(email)?,
            password: PasswordDigest::derive(password),
            created_at,
        })
    }
}

/// Read-only view of registered employees used by the participant lookup tool.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn email_for(&self, username: &str) -> Result<Option<String>, ApplicationError>;
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Email, User, Username};

    #[test]
    fn usernames_are_lowercased_and_trimmed() {
        let username = Username::parse("  Maria ").expect("valid username");
        assert_eq!(username.as_str(), "maria");
    }

    #[test]
    fn blank_or_spaced_usernames_are_rejected() {
        assert!(Username::parse("   ").is_err());
        assert!(Username::parse("maria silva").is_err());
    }

    #[test]
    fn email_requires_local_and_domain_parts() {
        assert!(Email::parse("maria@example.com").is_ok());
        assert!(Email::parse("maria").is_err());
        assert!(Email::parse("@example.com").is_err());
        assert!(Email::parse("maria@").is_err());
    }

    #[test]
    fn register_stores_digest_instead_of_password() {
        let user = User::register("Joao", "joao@example.com", "s3cret", Utc::now())
            .expect("registration input is valid");

        assert_eq!(user.username.as_str(), "joao");
        assert!(user.password.verify("s3cret"));
        assert!(!user.password.verify("S3cret"));
        assert!(!format!("{:?}", user.password).contains("s3cret"));
    }

    #[test]
    fn register_rejects_empty_password() {
        assert!(User::register("joao", "joao@example.com", "", Utc::now()).is_err());
    }
}
