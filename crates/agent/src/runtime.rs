use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use onboard_calendar::CalendarService;
use onboard_core::config::AssistantConfig;
use onboard_core::domain::conversation::{ConversationHistory, ConversationTurn, HISTORY_RUNS};
use onboard_core::domain::user::UserDirectory;

use crate::agent::{Agent, DEFAULT_MAX_TOOL_ROUNDS};
use crate::calendar_tools::calendar_toolset;
use crate::context::UserContext;
use crate::directory::UserEmailTool;
use crate::guardrails::GuardrailPolicy;
use crate::knowledge::{KnowledgeBase, KnowledgeSearchTool};
use crate::llm::LlmClient;
use crate::prompts;
use crate::revision::parse_verdict;
use crate::routing::{classify, Route};
use crate::search::{TavilySearch, WebSearchTool};
use crate::tools::ToolRegistry;

/// Optional collaborators of the help flow.
#[derive(Default)]
pub struct HelpSources {
    pub knowledge: Option<Arc<KnowledgeBase>>,
    pub web_search: Option<TavilySearch>,
}

/// The routing pipeline: classify, then help, calendar, or direct answer.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    calendar: CalendarService,
    guardrails: GuardrailPolicy,
    assistant: AssistantConfig,
    max_tool_rounds: u32,
    history: Option<Arc<dyn ConversationHistory>>,
    classifier: Agent,
    helper: Agent,
    participants: Agent,
    revisor: Agent,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        calendar: CalendarService,
        directory: Arc<dyn UserDirectory>,
        sources: HelpSources,
        guardrails: GuardrailPolicy,
        assistant: AssistantConfig,
    ) -> Self {
        let mut help_tools = ToolRegistry::default();
        help_tools.register(KnowledgeSearchTool::new(sources.knowledge));
        if let Some(web_search) = sources.web_search {
            help_tools.register(WebSearchTool::new(web_search));
        }
        let mut participant_tools = ToolRegistry::default();
        participant_tools.register(UserEmailTool::new(directory));

        Self {
            classifier: Agent::new("classifier", prompts::classifier_instructions(&assistant)),
            helper: Agent::new("helper", prompts::help_instructions(&assistant))
                .with_tools(help_tools),
            participants: Agent::new("participants", prompts::participant_instructions())
                .with_tools(participant_tools),
            revisor: Agent::new("revisor", prompts::revisor_instructions(&assistant)),
            llm,
            calendar,
            guardrails,
            assistant,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            history: None,
        }
    }

    /// Gives the help, participant and calendar agents memory of recent exchanges.
    pub fn with_history(mut self, history: Arc<dyn ConversationHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_max_tool_rounds(mut self, max_tool_rounds: u32) -> Self {
        self.max_tool_rounds = max_tool_rounds.max(1);
        self.helper = self.helper.with_max_tool_rounds(self.max_tool_rounds);
        self.participants = self.participants.with_max_tool_rounds(self.max_tool_rounds);
        self
    }

    pub fn help_tools(&self) -> Vec<&str> {
        self.helper.tools().names()
    }

    /// Answers one chat message. Failures of external calls become a generic reply.
    pub async fn handle_message(&self, user: &UserContext, message: &str) -> String {
        match self.route(user, message).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(
                    event_name = "agent.pipeline.failed",
                    username = %user.username,
                    error = %format!("{error:#}"),
                    "could not answer chat message"
                );
                prompts::FALLBACK_REPLY.to_string()
            }
        }
    }

    async fn route(&self, user: &UserContext, message: &str) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            return Ok(prompts::EMPTY_MESSAGE_REPLY.to_string());
        }

        let directive = prompts::permission_directive(user.level);
        let classification = self
            .classifier
            .run(self.llm.as_ref(), &prompts::classifier_input(message, &user.username, &directive))
            .await?;

        let route = classify(&classification);
        info!(
            event_name = "agent.route.selected",
            username = %user.username,
            route = match &route {
                Route::Calendar => "calendar",
                Route::Help => "help",
                Route::DirectAnswer(_) => "direct",
            },
            "classified chat message"
        );

        match route {
            Route::Calendar => self.calendar_flow(user, message, &directive).await,
            Route::Help => {
                let answer = self
                    .run_remembered(&self.helper, user, &prompts::user_input(message, &user.username))
                    .await?;
                self.revise(answer).await
            }
            Route::DirectAnswer(answer) => self.revise(answer).await,
        }
    }

    async fn calendar_flow(
        &self,
        user: &UserContext,
        message: &str,
        directive: &str,
    ) -> Result<String> {
        let attendees = self
            .run_remembered(&self.participants, user, &prompts::user_input(message, &user.username))
            .await?;
        if is_missing_email(&attendees) {
            info!(
                event_name = "agent.participants.unresolved",
                username = %user.username,
                "participant email lookup failed"
            );
            return Ok(attendees);
        }

        let input = prompts::calendar_input(
            message,
            &user.username,
            self.calendar.now(),
            &attendees,
            directive,
        );
        let agent = Agent::new("calendar", prompts::calendar_instructions(&self.assistant))
            .with_tools(calendar_toolset(self.calendar.clone(), self.guardrails.clone(), user.level))
            .with_max_tool_rounds(self.max_tool_rounds);
        self.run_remembered(&agent, user, &input).await
    }

    /// Runs `agent` after its recent exchanges with `user`, then records the new one.
    /// History failures are logged and never fail the reply.
    async fn run_remembered(&self, agent: &Agent, user: &UserContext, input: &str) -> Result<String> {
        let Some(history) = &self.history else {
            return agent.run(self.llm.as_ref(), input).await;
        };

        let earlier = history
            .recent(&user.username, agent.name(), HISTORY_RUNS)
            .await
            .unwrap_or_else(|error| {
                warn!(
                    event_name = "agent.history.load_failed",
                    username = %user.username,
                    agent = agent.name(),
                    error = %error,
                    "continuing without conversation history"
                );
                Vec::new()
            });

        let answer = agent.run_with_history(self.llm.as_ref(), &earlier, input).await?;

        let turn = ConversationTurn::new(input, answer.clone());
        if let Err(error) = history.append(&user.username, agent.name(), turn).await {
            warn!(
                event_name = "agent.history.save_failed",
                username = %user.username,
                agent = agent.name(),
                error = %error,
                "conversation turn was not stored"
            );
        }
        Ok(answer)
    }

    async fn revise(&self, answer: String) -> Result<String> {
        let verdict = self.revisor.run(self.llm.as_ref(), &answer).await?;
        Ok(parse_verdict(&verdict).resolve(&answer))
    }
}

fn is_missing_email(output: &str) -> bool {
    let sentinel = prompts::EMAIL_NOT_FOUND.trim_end_matches('.').to_lowercase();
    output.to_lowercase().contains(&sentinel)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, FixedOffset};
    use serde_json::json;

    use onboard_calendar::{CalendarService, CalendarSettings, InMemoryCalendar};
    use onboard_core::clock::FixedClock;
    use onboard_core::config::AssistantConfig;
    use onboard_core::domain::calendar::{CalendarEvent, EventId};
    use onboard_core::domain::conversation::{ConversationHistory, ConversationTurn};
    use onboard_core::domain::permission::PermissionLevel;
    use onboard_core::domain::user::UserDirectory;
    use onboard_core::errors::ApplicationError;

    use super::{AgentRuntime, HelpSources};
    use crate::context::UserContext;
    use crate::guardrails::GuardrailPolicy;
    use crate::llm::{Completion, Role, ScriptedLlm};
    use crate::prompts::{EMAIL_NOT_FOUND, EMPTY_MESSAGE_REPLY, FALLBACK_REPLY};

    struct Staff(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl UserDirectory for Staff {
        async fn email_for(&self, username: &str) -> Result<Option<String>, ApplicationError> {
            Ok(self.0.get(username).map(|email| email.to_string()))
        }
    }

    #[derive(Default)]
    struct Notebook {
        turns: Mutex<Vec<(String, String, ConversationTurn)>>,
        broken: bool,
    }

    #[async_trait]
    impl ConversationHistory for Notebook {
        async fn recent(
            &self,
            username: &str,
            agent: &str,
            limit: usize,
        ) -> Result<Vec<ConversationTurn>, ApplicationError> {
            if self.broken {
                return Err(ApplicationError::Persistence("database is locked".to_string()));
            }
            let turns = self.turns.lock().expect("notebook");
            let mine: Vec<_> = turns
                .iter()
                .filter(|(user, name, _)| user == username && name == agent)
                .map(|(_, _, turn)| turn.clone())
                .collect();
            Ok(mine[mine.len().saturating_sub(limit)..].to_vec())
        }

        async fn append(
            &self,
            username: &str,
            agent: &str,
            turn: ConversationTurn,
        ) -> Result<(), ApplicationError> {
            if self.broken {
                return Err(ApplicationError::Persistence("database is locked".to_string()));
            }
            self.turns.lock().expect("notebook").push((username.to_string(), agent.to_string(), turn));
            Ok(())
        }
    }

    fn at(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).expect("fixture time")
    }

    fn runtime(llm: Arc<ScriptedLlm>) -> (AgentRuntime, Arc<InMemoryCalendar>) {
        let calendar = Arc::new(InMemoryCalendar::with_events(vec![CalendarEvent {
            id: EventId("kickoff".to_string()),
            summary: "Onboarding kickoff".to_string(),
            location: None,
            description: None,
            start: at("2025-03-10T10:00:00-03:00"),
            end: at("2025-03-10T11:00:00-03:00"),
            attendees: vec!["ana@example.com".to_string()],
        }]));
        let settings = CalendarSettings {
            offset: FixedOffset::west_opt(3 * 3600).expect("offset"),
            time_zone: "America/Sao_Paulo".to_string(),
            default_event_hours: 3,
            search_window_days: 30,
            max_search_results: 10,
            list_limit: 5,
        };
        let service = CalendarService::new(
            calendar.clone(),
            Arc::new(FixedClock(at("2025-03-10T08:00:00-03:00"))),
            settings,
        );
        let directory = Staff(HashMap::from([("ana", "ana@example.com")]));
        let assistant = AssistantConfig {
            company_name: "Acme".to_string(),
            allowed_technologies: vec!["GitHub".to_string(), "Jira".to_string()],
        };
        let runtime = AgentRuntime::new(
            llm,
            service,
            Arc::new(directory),
            HelpSources::default(),
            GuardrailPolicy::default(),
            assistant,
        );
        (runtime, calendar)
    }

    fn ana(level: PermissionLevel) -> UserContext {
        UserContext::new("ana", "ana@example.com", level)
    }

    #[tokio::test]
    async fn help_flow_returns_revised_answer() {
        let llm = Arc::new(ScriptedLlm::new([
            Completion::text("Help"),
            Completion::text("We use SomeOtherTracker and Jira."),
            Completion::text("Revised text: We use Jira."),
        ]));
        let (runtime, _) = runtime(llm.clone());

        let reply =
            runtime.handle_message(&ana(PermissionLevel::Readonly), "Which tools do we use?").await;

        assert_eq!(reply, "We use Jira.");
        let requests = llm.requests();
        let classifier_input = requests[0].messages[1].content.clone().unwrap_or_default();
        assert!(classifier_input.contains("User: ana"));
        assert!(classifier_input.contains("LEVEL: READONLY"));
        assert_eq!(requests[1].tools.len(), 1);
    }

    #[tokio::test]
    async fn direct_answer_is_kept_when_valid() {
        let llm = Arc::new(ScriptedLlm::new([
            Completion::text("Hi! How can I help you today?"),
            Completion::text("Valid response"),
        ]));
        let (runtime, _) = runtime(llm.clone());

        let reply = runtime.handle_message(&ana(PermissionLevel::FullAccess), "hello").await;

        assert_eq!(reply, "Hi! How can I help you today?");
        assert_eq!(llm.remaining(), 0);
    }

    #[tokio::test]
    async fn empty_message_is_answered_without_the_model() {
        let llm = Arc::new(ScriptedLlm::default());
        let (runtime, _) = runtime(llm.clone());

        let reply = runtime.handle_message(&ana(PermissionLevel::FullAccess), "   ").await;

        assert_eq!(reply, EMPTY_MESSAGE_REPLY);
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn unresolved_participants_short_circuit() {
        let llm = Arc::new(ScriptedLlm::new([
            Completion::text("Calendar"),
            Completion::tool_call("call-1", "get_user_email", json!({ "username": "zeca" })),
            Completion::text(EMAIL_NOT_FOUND),
        ]));
        let (runtime, _) = runtime(llm.clone());

        let reply = runtime
            .handle_message(&ana(PermissionLevel::FullAccess), "Book a meeting with zeca")
            .await;

        assert_eq!(reply, EMAIL_NOT_FOUND);
        let requests = llm.requests();
        assert_eq!(requests.len(), 3);
        let lookup = requests[2].messages.last().expect("tool result");
        assert_eq!(lookup.role, Role::Tool);
        assert_eq!(lookup.content.as_deref(), Some("User not found!"));
    }

    #[tokio::test]
    async fn calendar_flow_enforces_permissions_and_skips_revision() {
        let llm = Arc::new(ScriptedLlm::new([
            Completion::text("Calendar"),
            Completion::text("ana@example.com"),
            Completion::tool_call(
                "call-1",
                "delete_calendar_event",
                json!({ "summary": "kickoff" }),
            ),
            Completion::text("You are not allowed to delete events."),
        ]));
        let (runtime, calendar) = runtime(llm.clone());

        let reply = runtime
            .handle_message(&ana(PermissionLevel::Readonly), "Cancel my onboarding kickoff")
            .await;

        assert_eq!(reply, "You are not allowed to delete events.");
        assert_eq!(calendar.snapshot().await.len(), 1);
        let requests = llm.requests();
        assert_eq!(requests.len(), 4);
        let calendar_input = requests[2].messages[1].content.clone().unwrap_or_default();
        assert!(calendar_input.contains("Today: 2025-03-10T08:00:00"));
        assert!(calendar_input.contains("Attendees: ana@example.com"));
        let tool_output = requests[3].messages.last().and_then(|m| m.content.clone());
        assert!(tool_output.unwrap_or_default().starts_with("Permission error"));
    }

    #[tokio::test]
    async fn model_failure_becomes_fallback_reply() {
        let llm = Arc::new(ScriptedLlm::new([Completion::text("Help")]));
        let (runtime, _) = runtime(llm);

        let reply = runtime.handle_message(&ana(PermissionLevel::FullAccess), "What is Jira?").await;

        assert_eq!(reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn helper_sees_the_previous_exchange() {
        let llm = Arc::new(ScriptedLlm::new([
            Completion::text("Help"),
            Completion::text("Jira tracks our tickets."),
            Completion::text("Valid response"),
            Completion::text("Help"),
            Completion::text("Open it from the Acme portal."),
            Completion::text("Valid response"),
        ]));
        let notebook = Arc::new(Notebook::default());
        let (runtime, _) = runtime(llm.clone());
        let runtime = runtime.with_history(notebook.clone());
        let user = ana(PermissionLevel::Readonly);

        runtime.handle_message(&user, "What is Jira?").await;
        let reply = runtime.handle_message(&user, "How do I open it?").await;

        assert_eq!(reply, "Open it from the Acme portal.");
        let requests = llm.requests();
        let second_help = &requests[4].messages;
        assert_eq!(second_help.len(), 4);
        assert_eq!(second_help[1].role, Role::User);
        assert!(second_help[1].content.clone().unwrap_or_default().contains("What is Jira?"));
        assert_eq!(second_help[2].content.as_deref(), Some("Jira tracks our tickets."));
        // classifier and revisor run without history
        assert_eq!(requests[3].messages.len(), 2);
        assert_eq!(requests[5].messages.len(), 2);
        let stored = notebook.recent("ana", "helper", 5).await.expect("recent");
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn history_failures_do_not_block_the_reply() {
        let llm = Arc::new(ScriptedLlm::new([
            Completion::text("Help"),
            Completion::text("Jira tracks our tickets."),
            Completion::text("Valid response"),
        ]));
        let notebook = Arc::new(Notebook { broken: true, ..Notebook::default() });
        let (runtime, _) = runtime(llm);
        let runtime = runtime.with_history(notebook);

        let reply = runtime.handle_message(&ana(PermissionLevel::Readonly), "What is Jira?").await;

        assert_eq!(reply, "Jira tracks our tickets.");
    }
}
