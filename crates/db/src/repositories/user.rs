use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use onboard_core::domain::user::{Email, User, UserDirectory, Username};
use onboard_core::errors::ApplicationError;
use onboard_core::password::PasswordDigest;

use super::{RepositoryError, UserRepository};
use crate::DbPool;

#[derive(Clone)]
pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode<T>(result: Result<T, sqlx::Error>) -> Result<T, RepositoryError> {
    result.map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    let username: String = decode(row.try_get("username"))?;
    let email: String = decode(row.try_get("email"))?;
    let password_hash: String = decode(row.try_get("password_hash"))?;
    let password_salt: String = decode(row.try_get("password_salt"))?;
    let created_at: String = decode(row.try_get("created_at"))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("users.created_at: {e}")))?;

    Ok(User {
        username: Username::parse(&username)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        email: Email::parse(&email).map_err(|e| RepositoryError::Decode(e.to_string()))?,
        password: PasswordDigest::from_parts(password_salt, password_hash),
        created_at,
    })
}

fn duplicate_field(error: &sqlx::Error) -> Option<String> {
    let database_error = error.as_database_error()?;
    if !database_error.is_unique_violation() {
        return None;
    }
    let message = database_error.message();
    let field = if message.contains("users.email") { "email" } else { "username" };
    Some(field.to_string())
}

#[async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT username, email, password_hash, password_salt, created_at
             FROM users WHERE username = ?",
        )
        .bind(username.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_user(r)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, user: User) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, password_salt, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(user.password.hash())
        .bind(user.password.salt())
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) => match duplicate_field(&error) {
                Some(field) => Err(RepositoryError::Duplicate(field)),
                None => Err(RepositoryError::Database(error)),
            },
        }
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM users").fetch_one(&self.pool).await?;
        decode(row.try_get::<i64, _>("count"))
    }
}

#[async_trait]
impl UserDirectory for SqlUserRepository {
    async fn email_for(&self, username: &str) -> Result<Option<String>, ApplicationError> {
        let row = sqlx::query("SELECT email FROM users WHERE username = ? COLLATE NOCASE")
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        match row {
            Some(row) => Ok(Some(decode(row.try_get::<String, _>("email"))?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use onboard_core::domain::user::{User, UserDirectory, Username};

    use super::SqlUserRepository;
    use crate::repositories::{RepositoryError, UserRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_user(username: &str, email: &str) -> User {
        User::register(username, email, "s3cret", Utc::now()).expect("valid sample user")
    }

    #[tokio::test]
    async fn create_and_find_by_username() {
        let repo = SqlUserRepository::new(setup().await);
        repo.create(sample_user("maria", "maria@example.com")).await.expect("create");

        let username = Username::parse("Maria").expect("username");
        let found = repo.find_by_username(&username).await.expect("find").expect("should exist");

        assert_eq!(found.email.as_str(), "maria@example.com");
        assert!(found.password.verify("s3cret"));
        assert!(!found.password.verify("wrong"));
    }

    #[tokio::test]
    async fn missing_user_is_none() {
        let repo = SqlUserRepository::new(setup().await);
        let username = Username::parse("ghost").expect("username");

        assert!(repo.find_by_username(&username).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_reported() {
        let repo = SqlUserRepository::new(setup().await);
        repo.create(sample_user("maria", "maria@example.com")).await.expect("create");

        let error = repo
            .create(sample_user("MARIA", "other@example.com"))
            .await
            .expect_err("username already taken");
        assert!(matches!(error, RepositoryError::Duplicate(ref field) if field == "username"));
        assert_eq!(repo.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn duplicate_email_is_reported() {
        let repo = SqlUserRepository::new(setup().await);
        repo.create(sample_user("maria", "maria@example.com")).await.expect("create");

        let error = repo
            .create(sample_user("joao", "MARIA@example.com"))
            .await
            .expect_err("email already taken");
        assert!(matches!(error, RepositoryError::Duplicate(ref field) if field == "email"));
    }

    #[tokio::test]
    async fn directory_lookup_ignores_case() {
        let repo = SqlUserRepository::new(setup().await);
        repo.create(sample_user("joao", "joao@example.com")).await.expect("create");

        assert_eq!(
            repo.email_for(" JOAO ").await.expect("lookup"),
            Some("joao@example.com".to_string())
        );
        assert_eq!(repo.email_for("pedro").await.expect("lookup"), None);
    }
}
