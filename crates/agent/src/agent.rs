use anyhow::{bail, Result};
use tracing::debug;

use onboard_core::domain::conversation::ConversationTurn;

use crate::llm::{ChatMessage, CompletionRequest, LlmClient};
use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 8;

/// One LLM role: fixed instructions plus an optional tool set.
pub struct Agent {
    name: &'static str,
    instructions: String,
    tools: ToolRegistry,
    max_tool_rounds: u32,
}

impl Agent {
    pub fn new(name: &'static str, instructions: impl Into<String>) -> Self {
        Self {
            name,
            instructions: instructions.into(),
            tools: ToolRegistry::default(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_max_tool_rounds(mut self, max_tool_rounds: u32) -> Self {
        self.max_tool_rounds = max_tool_rounds.max(1);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Runs the model until it answers without calling tools.
    pub async fn run(&self, llm: &dyn LlmClient, input: &str) -> Result<String> {
        self.run_with_history(llm, &[], input).await
    }

    /// Like [`Agent::run`], replaying earlier exchanges between the instructions and `input`.
    pub async fn run_with_history(
        &self,
        llm: &dyn LlmClient,
        history: &[ConversationTurn],
        input: &str,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(ChatMessage::system(&self.instructions));
        for turn in history {
            messages.push(ChatMessage::user(&turn.user_message));
            messages.push(ChatMessage::assistant(&turn.assistant_message));
        }
        messages.push(ChatMessage::user(input));
        let tools = self.tools.specs();

        for round in 0..self.max_tool_rounds {
            let completion = llm
                .complete(CompletionRequest { messages: messages.clone(), tools: tools.clone() })
                .await?;

            if completion.tool_calls.is_empty() {
                debug!(event_name = "agent.completed", agent = self.name, round, "agent answered");
                return Ok(completion.content.unwrap_or_default().trim().to_string());
            }

            messages.push(ChatMessage::assistant_tool_calls(
                completion.content,
                completion.tool_calls.clone(),
            ));
            for call in &completion.tool_calls {
                let output = self.tools.dispatch(call).await;
                messages.push(ChatMessage::tool_result(&call.id, output));
            }
        }

        bail!("agent `{}` exceeded {} tool rounds", self.name, self.max_tool_rounds)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use onboard_core::domain::conversation::ConversationTurn;

    use super::Agent;
    use crate::llm::{Completion, Role, ScriptedLlm};
    use crate::tools::{Tool, ToolRegistry};

    struct Clock;

    #[async_trait]
    impl Tool for Clock {
        fn name(&self) -> &'static str {
            "current_time"
        }

        fn description(&self) -> &'static str {
            "Current time"
        }

        fn parameters(&self) -> Value {
            json!({ "type": "object", "properties": {} })
        }

        async fn execute(&self, _input: Value) -> Result<Value> {
            Ok(json!("2025-03-10T08:00:00"))
        }
    }

    fn agent() -> Agent {
        let mut tools = ToolRegistry::default();
        tools.register(Clock);
        Agent::new("calendar", "You manage calendars.").with_tools(tools)
    }

    #[tokio::test]
    async fn tool_results_are_fed_back_to_the_model() {
        let llm = ScriptedLlm::new([
            Completion::tool_call("call-1", "current_time", json!({})),
            Completion::text("  It is 8 AM.  "),
        ]);

        let answer = agent().run(&llm, "what time is it?").await.expect("answer");

        assert_eq!(answer, "It is 8 AM.");
        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools.len(), 1);
        let last = requests[1].messages.last().expect("tool message");
        assert_eq!(last.role, Role::Tool);
        assert_eq!(last.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(last.content.as_deref(), Some("2025-03-10T08:00:00"));
    }

    #[tokio::test]
    async fn runaway_tool_loops_are_cut_off() {
        let llm = ScriptedLlm::new(
            (0..3).map(|i| Completion::tool_call(&format!("call-{i}"), "current_time", json!({}))),
        );

        let error = agent().with_max_tool_rounds(2).run(&llm, "loop").await.expect_err("cap");

        assert!(error.to_string().contains("exceeded 2 tool rounds"));
        assert_eq!(llm.remaining(), 1);
    }

    #[tokio::test]
    async fn llm_failures_propagate() {
        let llm = ScriptedLlm::default();

        assert!(agent().run(&llm, "hi").await.is_err());
    }

    #[tokio::test]
    async fn history_is_replayed_before_the_new_message() {
        let llm = ScriptedLlm::new([Completion::text("Moved to 15:00.")]);
        let history = [ConversationTurn::new("Book a sync at 10", "Booked 'Sync' at 10:00.")];

        let answer = agent()
            .run_with_history(&llm, &history, "move it to 3pm")
            .await
            .expect("answer");

        assert_eq!(answer, "Moved to 15:00.");
        let requests = llm.requests();
        let messages = &requests[0].messages;
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(messages[2].content.as_deref(), Some("Booked 'Sync' at 10:00."));
        assert_eq!(messages[3].content.as_deref(), Some("move it to 3pm"));
    }
}
