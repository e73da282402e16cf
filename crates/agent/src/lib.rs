//! Agent runtime for the onboarding assistant.
//!
//! Each chat message goes through a fixed pipeline:
//! 1. **Classify** (`routing`) - the classifier agent labels the message as a calendar
//!    request, a help request, or answers it directly
//! 2. **Help** - the help agent answers from the knowledge base (`knowledge`) and web
//!    search (`search`)
//! 3. **Calendar** - the participant agent resolves attendee emails (`directory`), then the
//!    calendar agent works through the calendar tools (`calendar_tools`), each gated by
//!    the user's permission level (`guardrails`)
//! 4. **Revision** (`revision`) - help and direct answers are checked against company
//!    policy before they reach the user
//!
//! The LLM never bypasses the gate: calendar tools refuse operations the session's
//! permission level does not grant.

pub mod agent;
pub mod calendar_tools;
pub mod context;
pub mod directory;
pub mod guardrails;
pub mod knowledge;
pub mod llm;
pub mod prompts;
pub mod revision;
pub mod routing;
pub mod runtime;
pub mod search;
pub mod tools;

pub use context::UserContext;
pub use guardrails::{GuardrailDecision, GuardrailPolicy};
pub use knowledge::KnowledgeBase;
#[cfg(any(test, feature = "test-util"))]
pub use llm::ScriptedLlm;
pub use llm::{LlmClient, OpenAiCompatibleClient};
pub use runtime::{AgentRuntime, HelpSources};
pub use search::TavilySearch;
