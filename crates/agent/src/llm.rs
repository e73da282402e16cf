use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use onboard_core::config::LlmConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self { role: Role::Assistant, content, tool_calls, tool_call_id: None }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: Some(content.into()), tool_calls: Vec::new(), tool_call_id: None }
    }
}

/// Function the model may call, described with a JSON schema.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Completion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), tool_calls: Vec::new() }
    }

    pub fn tool_call(id: &str, name: &str, arguments: Value) -> Self {
        Self {
            content: None,
            tool_calls: vec![ToolCall { id: id.to_string(), name: name.to_string(), arguments }],
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;
}

/// Chat-completions client for OpenAI and any server exposing the same API (Ollama, vLLM).
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    temperature: f32,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build llm http client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            temperature,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new(
            config.endpoint(),
            config.api_key.clone(),
            config.model.clone(),
            config.temperature,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let body = WireRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            tools: request.tools.iter().map(WireTool::from).collect(),
        };

        let mut builder = self.http.post(format!("{}/chat/completions", self.base_url)).json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        debug!(
            event_name = "llm.request",
            model = %self.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "sending chat completion"
        );
        let response = builder.send().await.context("llm request failed")?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(event_name = "llm.error", status = status.as_u16(), "llm returned an error");
            bail!("llm returned {status}: {detail}");
        }

        let parsed: WireResponse = response.json().await.context("llm response parse failed")?;
        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| anyhow!("llm response contained no choices"))?;

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: parse_arguments(&call.function.arguments),
            })
            .collect();
        Ok(Completion { content: message.content, tool_calls })
    }
}

/// Models occasionally return an empty string or non-JSON arguments.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Serialize)]
struct WireMessage {
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    kind: "function".to_string(),
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    },
                })
                .collect(),
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

impl From<&ToolSpec> for WireTool {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            kind: "function",
            function: WireFunction {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.parameters.clone(),
            },
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default)]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedLlm;

#[cfg(any(test, feature = "test-util"))]
mod scripted {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::{Completion, CompletionRequest, LlmClient};

    /// Replays canned completions in order and records every request it receives.
    #[derive(Default)]
    pub struct ScriptedLlm {
        replies: Mutex<VecDeque<Completion>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        pub fn new(replies: impl IntoIterator<Item = Completion>) -> Self {
            Self { replies: Mutex::new(replies.into_iter().collect()), requests: Mutex::default() }
        }

        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
        }

        pub fn remaining(&self) -> usize {
            self.replies.lock().map(|replies| replies.len()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request);
            }
            let next =
                self.replies.lock().map_err(|_| anyhow!("scripted llm lock poisoned"))?.pop_front();
            next.ok_or_else(|| anyhow!("scripted llm has no more replies"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::{ChatMessage, CompletionRequest, LlmClient, OpenAiCompatibleClient, ToolSpec};

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}/v1")
    }

    async fn tool_calling_handler(Json(body): Json<Value>) -> Json<Value> {
        assert_eq!(body["model"], "llama3.1");
        assert_eq!(body["tools"][0]["function"]["name"], "current_time");
        Json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call-1",
                        "type": "function",
                        "function": { "name": "current_time", "arguments": "{}" }
                    }]
                }
            }]
        }))
    }

    #[tokio::test]
    async fn decodes_tool_calls() {
        let base = spawn(Router::new().route("/v1/chat/completions", post(tool_calling_handler)))
            .await;
        let client =
            OpenAiCompatibleClient::new(base, None, "llama3.1", 0.0, Duration::from_secs(5))
                .expect("client");

        let completion = client
            .complete(CompletionRequest {
                messages: vec![ChatMessage::user("what time is it?")],
                tools: vec![ToolSpec {
                    name: "current_time".to_string(),
                    description: "Current time".to_string(),
                    parameters: json!({ "type": "object", "properties": {} }),
                }],
            })
            .await
            .expect("completion");

        assert_eq!(completion.content, None);
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].name, "current_time");
        assert_eq!(completion.tool_calls[0].arguments, json!({}));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let base = spawn(Router::new().route(
            "/v1/chat/completions",
            post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "bad key") }),
        ))
        .await;
        let client =
            OpenAiCompatibleClient::new(base, None, "gpt-4o", 0.0, Duration::from_secs(5))
                .expect("client");

        let error = client
            .complete(CompletionRequest {
                messages: vec![ChatMessage::user("hi")],
                tools: Vec::new(),
            })
            .await
            .expect_err("401");

        assert!(error.to_string().contains("401"));
    }
}
