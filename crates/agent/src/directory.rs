use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use onboard_core::domain::user::UserDirectory;

use crate::tools::{parse_args, Tool};

pub const GET_USER_EMAIL: &str = "get_user_email";
pub const USER_NOT_FOUND: &str = "User not found!";

/// Resolves an employee's email from their username, ignoring case.
pub struct UserEmailTool {
    directory: Arc<dyn UserDirectory>,
}

impl UserEmailTool {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }
}

#[derive(Deserialize)]
struct UserEmailArgs {
    username: String,
}

#[async_trait]
impl Tool for UserEmailTool {
    fn name(&self) -> &'static str {
        GET_USER_EMAIL
    }

    fn description(&self) -> &'static str {
        "Looks up the email address of an employee by username."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "username": { "type": "string" } },
            "required": ["username"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let args: UserEmailArgs = parse_args(GET_USER_EMAIL, input)?;
        let username = args.username.trim().to_lowercase();
        let email = self.directory.email_for(&username).await?;
        tracing::debug!(
            event_name = "directory.lookup",
            found = email.is_some(),
            "resolved participant email"
        );
        Ok(Value::String(email.unwrap_or_else(|| USER_NOT_FOUND.to_string())))
    }
}
