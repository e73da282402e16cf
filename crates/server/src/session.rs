use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use onboard_agent::UserContext;

/// Login sessions keyed by opaque token. Process-local: a restart logs everyone out.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, UserContext>>,
}

impl SessionStore {
    pub async fn open(&self, user: UserContext) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions.write().await.insert(token.clone(), user);
        token
    }

    pub async fn get(&self, token: &str) -> Option<UserContext> {
        self.sessions.read().await.get(token.trim()).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
