use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::llm::{ToolCall, ToolSpec};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    async fn execute(&self, input: Value) -> Result<Value>;
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    /// Runs a model-requested call. Failures become text the model can relay.
    pub async fn dispatch(&self, call: &ToolCall) -> String {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(event_name = "agent.tool.unknown", tool = %call.name, "model called unknown tool");
            return format!("Unknown tool `{}`.", call.name);
        };

        info!(event_name = "agent.tool.invoked", tool = %call.name, "executing tool call");
        match tool.execute(call.arguments.clone()).await {
            Ok(Value::String(text)) => text,
            Ok(value) => value.to_string(),
            Err(error) => {
                warn!(
                    event_name = "agent.tool.failed",
                    tool = %call.name,
                    error = %error,
                    "tool execution failed"
                );
                format!("Tool `{}` failed: {error:#}", call.name)
            }
        }
    }
}

/// Deserializes tool arguments. A missing or `null` argument object counts as `{}`.
pub fn parse_args<T: DeserializeOwned>(tool: &str, input: Value) -> Result<T> {
    let input = if input.is_null() { Value::Object(Default::default()) } else { input };
    serde_json::from_value(input).with_context(|| format!("invalid arguments for `{tool}`"))
}

/// Email list as models send it: a JSON array, or a single comma-separated string.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EmailList {
    #[default]
    Empty,
    Many(Vec<String>),
    Joined(String),
}

impl EmailList {
    pub fn into_vec(self) -> Vec<String> {
        let raw = match self {
            Self::Empty => Vec::new(),
            Self::Many(values) => values,
            Self::Joined(value) => vec![value],
        };
        raw.iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect()
    }
}
