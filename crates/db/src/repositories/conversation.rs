use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use onboard_core::domain::conversation::{ConversationHistory, ConversationTurn, HISTORY_RUNS};
use onboard_core::errors::ApplicationError;

use super::RepositoryError;
use crate::DbPool;

#[derive(Clone)]
pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationHistory for SqlConversationRepository {
    async fn recent(
        &self,
        username: &str,
        agent: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, ApplicationError> {
        let rows = sqlx::query(
            "SELECT user_message, assistant_message FROM (
                 SELECT id, user_message, assistant_message FROM conversation_turns
                 WHERE username = ? AND agent = ?
                 ORDER BY id DESC LIMIT ?
             ) ORDER BY id ASC",
        )
        .bind(username.trim())
        .bind(agent)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in rows {
            let user_message: String = row
                .try_get("user_message")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let assistant_message: String = row
                .try_get("assistant_message")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            turns.push(ConversationTurn { user_message, assistant_message });
        }
        Ok(turns)
    }

    async fn append(
        &self,
        username: &str,
        agent: &str,
        turn: ConversationTurn,
    ) -> Result<(), ApplicationError> {
        let username = username.trim();
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        sqlx::query(
            "INSERT INTO conversation_turns
                 (username, agent, user_message, assistant_message, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(username)
        .bind(agent)
        .bind(&turn.user_message)
        .bind(&turn.assistant_message)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        sqlx::query(
            "DELETE FROM conversation_turns
             WHERE username = ? AND agent = ? AND id NOT IN (
                 SELECT id FROM conversation_turns
                 WHERE username = ? AND agent = ?
                 ORDER BY id DESC LIMIT ?
             )",
        )
        .bind(username)
        .bind(agent)
        .bind(username)
        .bind(agent)
        .bind(HISTORY_RUNS as i64)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(())
    }
}
