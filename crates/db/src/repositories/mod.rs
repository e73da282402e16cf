use async_trait::async_trait;
use thiserror::Error;

use onboard_core::domain::user::{User, Username};
use onboard_core::errors::ApplicationError;

pub mod conversation;
pub mod memory;
pub mod user;

pub use conversation::SqlConversationRepository;
pub use memory::{InMemoryConversationRepository, InMemoryUserRepository};
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("duplicate value for unique field `{0}`")]
    Duplicate(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, RepositoryError>;

    /// Fails with [`RepositoryError::Duplicate`] when the username or email is already taken.
    async fn create(&self, user: User) -> Result<(), RepositoryError>;

    async fn count(&self) -> Result<i64, RepositoryError>;
}
