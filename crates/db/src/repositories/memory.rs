use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use onboard_core::domain::conversation::{ConversationHistory, ConversationTurn, HISTORY_RUNS};
use onboard_core::domain::user::{User, UserDirectory, Username};
use onboard_core::errors::ApplicationError;

use super::{RepositoryError, UserRepository};

/// Keyed by lower-cased username, mirroring the `COLLATE NOCASE` columns.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(username.as_str()).cloned())
    }

    async fn create(&self, user: User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        if users.contains_key(user.username.as_str()) {
            return Err(RepositoryError::Duplicate("username".to_string()));
        }
        let email_taken = users
            .values()
            .any(|existing| existing.email.as_str().eq_ignore_ascii_case(user.email.as_str()));
        if email_taken {
            return Err(RepositoryError::Duplicate("email".to_string()));
        }
        users.insert(user.username.as_str().to_string(), user);
        Ok(())
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(self.users.read().await.len() as i64)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserRepository {
    async fn email_for(&self, username: &str) -> Result<Option<String>, ApplicationError> {
        let users = self.users.read().await;
        let key = username.trim().to_lowercase();
        Ok(users.get(&key).map(|user| user.email.as_str().to_string()))
    }
}

/// Keyed by `(lower-cased username, agent)`.
#[derive(Default)]
pub struct InMemoryConversationRepository {
    turns: RwLock<HashMap<(String, String), VecDeque<ConversationTurn>>>,
}

fn conversation_key(username: &str, agent: &str) -> (String, String) {
    (username.trim().to_lowercase(), agent.to_string())
}

#[async_trait]
impl ConversationHistory for InMemoryConversationRepository {
    async fn recent(
        &self,
        username: &str,
        agent: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, ApplicationError> {
        let turns = self.turns.read().await;
        let Some(stored) = turns.get(&conversation_key(username, agent)) else {
            return Ok(Vec::new());
        };
        let skip = stored.len().saturating_sub(limit);
        Ok(stored.iter().skip(skip).cloned().collect())
    }

    async fn append(
        &self,
        username: &str,
        agent: &str,
        turn: ConversationTurn,
    ) -> Result<(), ApplicationError> {
        let mut turns = self.turns.write().await;
        let stored = turns.entry(conversation_key(username, agent)).or_default();
        stored.push_back(turn);
        while stored.len() > HISTORY_RUNS {
            stored.pop_front();
        }
        Ok(())
    }
}
