use chrono::Utc;

use onboard_core::domain::user::{User, Username};

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SqlUserRepository, UserRepository};

/// Demo employees for local runs and smoke checks. Passwords are for development only.
const DEMO_USERS: &[DemoUserContract] = &[
    DemoUserContract {
        username: "ana",
        email: "ana.souza@example.com",
        password: "onboard-demo",
        description: "new hire using the help flow",
    },
    DemoUserContract {
        username: "bruno",
        email: "bruno.lima@example.com",
        password: "onboard-demo",
        description: "manager scheduling onboarding meetings",
    },
    DemoUserContract {
        username: "carla",
        email: "carla.mendes@example.com",
        password: "onboard-demo",
        description: "HR partner invited to onboarding sessions",
    },
];

pub struct DemoUserSeed;

impl DemoUserSeed {
    /// Inserts every demo user that does not exist yet. Re-running is a no-op.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let repo = SqlUserRepository::new(pool.clone());
        let mut seeded = Vec::new();
        let mut skipped = Vec::new();

        for contract in DEMO_USERS {
            let user =
                User::register(contract.username, contract.email, contract.password, Utc::now())
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            match repo.create(user).await {
                Ok(()) => seeded.push(contract.username),
                Err(RepositoryError::Duplicate(_)) => skipped.push(contract.username),
                Err(error) => return Err(error),
            }
        }

        Ok(SeedResult { users_seeded: seeded, users_skipped: skipped })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let repo = SqlUserRepository::new(pool.clone());
        let mut checks = Vec::with_capacity(DEMO_USERS.len());

        for contract in DEMO_USERS {
            let username = Username::parse(contract.username)
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let present = match repo.find_by_username(&username).await? {
                Some(user) => {
                    user.email.as_str() == contract.email && user.password.verify(contract.password)
                }
                None => false,
            };
            checks.push((contract.username, present));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for contract in DEMO_USERS {
            sqlx::query("DELETE FROM users WHERE username = ?")
                .bind(contract.username)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub fn describe() -> Vec<(&'static str, &'static str)> {
        DEMO_USERS.iter().map(|contract| (contract.username, contract.description)).collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct DemoUserContract {
    username: &'static str,
    email: &'static str,
    password: &'static str,
    description: &'static str,
}

#[derive(Debug)]
pub struct SeedResult {
    pub users_seeded: Vec<&'static str>,
    pub users_skipped: Vec<&'static str>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
