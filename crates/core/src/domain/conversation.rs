use async_trait::async_trait;

use crate::errors::ApplicationError;

/// Exchanges replayed to an agent ahead of a new message.
pub const HISTORY_RUNS: usize = 5;

/// One completed exchange with an agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationTurn {
    pub user_message: String,
    pub assistant_message: String,
}

impl ConversationTurn {
    pub fn new(user_message: impl Into<String>, assistant_message: impl Into<String>) -> Self {
        Self { user_message: user_message.into(), assistant_message: assistant_message.into() }
    }
}

/// Per-employee, per-agent conversation memory. Usernames compare case-insensitively.
#[async_trait]
pub trait ConversationHistory: Send + Sync {
    /// The latest `limit` turns, oldest first.
    async fn recent(
        &self,
        username: &str,
        agent: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, ApplicationError>;

    /// Stores a turn and forgets everything but the latest [`HISTORY_RUNS`] turns.
    async fn append(
        &self,
        username: &str,
        agent: &str,
        turn: ConversationTurn,
    ) -> Result<(), ApplicationError>;
}
