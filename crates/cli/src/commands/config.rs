use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use onboard_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in entries(&config) {
        let source =
            field_source(key, env_key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

/// `(key path, rendered value, env override)` for every field worth showing. Secrets are redacted.
fn entries(config: &AppConfig) -> Vec<(&'static str, String, &'static str)> {
    vec![
        ("database.url", config.database.url.clone(), "ONBOARD_DATABASE_URL"),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            "ONBOARD_DATABASE_MAX_CONNECTIONS",
        ),
        ("llm.provider", format!("{:?}", config.llm.provider), "ONBOARD_LLM_PROVIDER"),
        ("llm.model", config.llm.model.clone(), "ONBOARD_LLM_MODEL"),
        ("llm.base_url", config.llm.endpoint().to_string(), "ONBOARD_LLM_BASE_URL"),
        ("llm.api_key", redact_secret(config.llm.api_key.as_ref()), "ONBOARD_LLM_API_KEY"),
        (
            "llm.max_tool_rounds",
            config.llm.max_tool_rounds.to_string(),
            "ONBOARD_LLM_MAX_TOOL_ROUNDS",
        ),
        ("server.bind_address", config.server.bind_address.clone(), "ONBOARD_SERVER_BIND_ADDRESS"),
        ("server.port", config.server.port.to_string(), "ONBOARD_SERVER_PORT"),
        (
            "calendar.provider",
            format!("{:?}", config.calendar.provider),
            "ONBOARD_CALENDAR_PROVIDER",
        ),
        ("calendar.calendar_id", config.calendar.calendar_id.clone(), "ONBOARD_CALENDAR_ID"),
        (
            "calendar.access_token",
            redact_secret(config.calendar.access_token.as_ref()),
            "ONBOARD_CALENDAR_ACCESS_TOKEN",
        ),
        ("calendar.time_zone", config.calendar.time_zone.clone(), "ONBOARD_CALENDAR_TIME_ZONE"),
        ("calendar.utc_offset", config.calendar.utc_offset.clone(), "ONBOARD_CALENDAR_UTC_OFFSET"),
        (
            "calendar.token_dir",
            config.calendar.token_dir.display().to_string(),
            "ONBOARD_CALENDAR_TOKEN_DIR",
        ),
        (
            "calendar.enforce_permissions",
            config.calendar.enforce_permissions.to_string(),
            "ONBOARD_CALENDAR_ENFORCE_PERMISSIONS",
        ),
        (
            "knowledge.documents_dir",
            config.knowledge.documents_dir.display().to_string(),
            "ONBOARD_KNOWLEDGE_DOCUMENTS_DIR",
        ),
        ("knowledge.top_k", config.knowledge.top_k.to_string(), "ONBOARD_KNOWLEDGE_TOP_K"),
        ("search.api_key", redact_secret(config.search.api_key.as_ref()), "ONBOARD_SEARCH_API_KEY"),
        (
            "assistant.company_name",
            config.assistant.company_name.clone(),
            "ONBOARD_ASSISTANT_COMPANY_NAME",
        ),
        ("logging.level", config.logging.level.clone(), "ONBOARD_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "ONBOARD_LOGGING_FORMAT"),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["onboard.toml", "config/onboard.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a short prefix such as `sk-` so operators can tell which key is loaded.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once('-') {
        Some((prefix, _)) if prefix.len() <= 4 => format!("{prefix}-***"),
        _ => "<redacted>".to_string(),
    }
}
