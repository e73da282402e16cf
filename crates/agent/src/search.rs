use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use onboard_core::config::SearchConfig;

use crate::tools::{parse_args, Tool};

pub const WEB_SEARCH: &str = "web_search";

/// Tavily search API client.
pub struct TavilySearch {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    max_results: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: u32,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

impl TavilySearch {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        max_results: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build search http client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            max_results,
        })
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &SearchConfig, timeout: Duration) -> Result<Option<Self>> {
        match &config.api_key {
            Some(api_key) if !api_key.expose_secret().trim().is_empty() => Ok(Some(Self::new(
                config.base_url.clone(),
                api_key.clone(),
                config.max_results,
                timeout,
            )?)),
            _ => Ok(None),
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&SearchRequest { query, max_results: self.max_results })
            .send()
            .await
            .context("web search request failed")?;

        let status = response.status();
        if !status.is_success() {
            warn!(event_name = "search.error", status = status.as_u16(), "web search failed");
            bail!("web search returned {status}");
        }
        let body: SearchResponse = response.json().await.context("web search parse failed")?;
        Ok(body.results)
    }
}

pub struct WebSearchTool {
    client: TavilySearch,
}

impl WebSearchTool {
    pub fn new(client: TavilySearch) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct WebSearchArgs {
    query: String,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        WEB_SEARCH
    }

    fn description(&self) -> &'static str {
        "Searches the web. Use it for questions about a technology the company works with."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let args: WebSearchArgs = parse_args(WEB_SEARCH, input)?;
        let hits = self.client.search(&args.query).await?;
        if hits.is_empty() {
            return Ok(Value::String("No web results found.".to_string()));
        }

        let formatted: Vec<String> = hits
            .iter()
            .map(|hit| format!("{} ({})\n{}", hit.title, hit.url, hit.content))
            .collect();
        Ok(Value::String(formatted.join("\n\n")))
    }
}
