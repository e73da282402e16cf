use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::parse_utc_offset;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub calendar: CalendarConfig,
    pub knowledge: KnowledgeConfig,
    pub search: SearchConfig,
    pub assistant: AssistantConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_tool_rounds: u32,
}

impl LlmConfig {
    /// Base URL of the OpenAI-compatible API, falling back to the provider's public endpoint.
    pub fn endpoint(&self) -> &str {
        match self.base_url.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
            Some(base_url) => base_url,
            None => match self.provider {
                LlmProvider::OpenAi => "https://api.openai.com/v1",
                LlmProvider::Ollama => "http://localhost:11434/v1",
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CalendarConfig {
    pub provider: CalendarProviderKind,
    pub api_base_url: String,
    pub calendar_id: String,
    pub access_token: Option<SecretString>,
    pub time_zone: String,
    pub utc_offset: String,
    pub token_dir: PathBuf,
    pub enforce_permissions: bool,
    pub default_event_hours: u32,
    pub search_window_days: u32,
    pub max_search_results: u32,
    pub list_limit: u32,
}

impl CalendarConfig {
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        parse_utc_offset(&self.utc_offset).map_err(|_| {
            ConfigError::Validation(format!(
                "calendar.utc_offset `{}` must look like `-03:00` or `+05:30`",
                self.utc_offset
            ))
        })
    }
}

#[derive(Clone, Debug)]
pub struct KnowledgeConfig {
    pub documents_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub max_results: u32,
}

#[derive(Clone, Debug)]
pub struct AssistantConfig {
    pub company_name: String,
    pub allowed_technologies: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarProviderKind {
    Google,
    Memory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub server_port: Option<u16>,
    pub calendar_provider: Option<CalendarProviderKind>,
    pub knowledge_documents_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://onboard.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: None,
                model: "llama3.1".to_string(),
                temperature: 0.0,
                timeout_secs: 60,
                max_tool_rounds: 8,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            calendar: CalendarConfig {
                provider: CalendarProviderKind::Memory,
                api_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
                calendar_id: "primary".to_string(),
                access_token: None,
                time_zone: "America/Sao_Paulo".to_string(),
                utc_offset: "-03:00".to_string(),
                token_dir: PathBuf::from("auth/tokens"),
                enforce_permissions: true,
                default_event_hours: 3,
                search_window_days: 30,
                max_search_results: 10,
                list_limit: 5,
            },
            knowledge: KnowledgeConfig {
                documents_dir: PathBuf::from("data/knowledge"),
                chunk_size: 500,
                chunk_overlap: 100,
                top_k: 3,
            },
            search: SearchConfig {
                api_key: None,
                base_url: "https://api.tavily.com".to_string(),
                max_results: 5,
            },
            assistant: AssistantConfig {
                company_name: "the company".to_string(),
                allowed_technologies: Vec::new(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for CalendarProviderKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Validation(format!(
                "unsupported calendar provider `{other}` (expected google|memory)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("onboard.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_tool_rounds) = llm.max_tool_rounds {
                self.llm.max_tool_rounds = max_tool_rounds;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(calendar) = patch.calendar {
            if let Some(provider) = calendar.provider {
                self.calendar.provider = provider;
            }
            if let Some(api_base_url) = calendar.api_base_url {
                self.calendar.api_base_url = api_base_url;
            }
            if let Some(calendar_id) = calendar.calendar_id {
                self.calendar.calendar_id = calendar_id;
            }
            if let Some(access_token) = calendar.access_token {
                self.calendar.access_token = Some(secret_value(access_token));
            }
            if let Some(time_zone) = calendar.time_zone {
                self.calendar.time_zone = time_zone;
            }
            if let Some(utc_offset) = calendar.utc_offset {
                self.calendar.utc_offset = utc_offset;
            }
            if let Some(token_dir) = calendar.token_dir {
                self.calendar.token_dir = token_dir;
            }
            if let Some(enforce_permissions) = calendar.enforce_permissions {
                self.calendar.enforce_permissions = enforce_permissions;
            }
            if let Some(default_event_hours) = calendar.default_event_hours {
                self.calendar.default_event_hours = default_event_hours;
            }
            if let Some(search_window_days) = calendar.search_window_days {
                self.calendar.search_window_days = search_window_days;
            }
            if let Some(max_search_results) = calendar.max_search_results {
                self.calendar.max_search_results = max_search_results;
            }
            if let Some(list_limit) = calendar.list_limit {
                self.calendar.list_limit = list_limit;
            }
        }

        if let Some(knowledge) = patch.knowledge {
            if let Some(documents_dir) = knowledge.documents_dir {
                self.knowledge.documents_dir = documents_dir;
            }
            if let Some(chunk_size) = knowledge.chunk_size {
                self.knowledge.chunk_size = chunk_size;
            }
            if let Some(chunk_overlap) = knowledge.chunk_overlap {
                self.knowledge.chunk_overlap = chunk_overlap;
            }
            if let Some(top_k) = knowledge.top_k {
                self.knowledge.top_k = top_k;
            }
        }

        if let Some(search) = patch.search {
            if let Some(api_key) = search.api_key {
                self.search.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = search.base_url {
                self.search.base_url = base_url;
            }
            if let Some(max_results) = search.max_results {
                self.search.max_results = max_results;
            }
        }

        if let Some(assistant) = patch.assistant {
            if let Some(company_name) = assistant.company_name {
                self.assistant.company_name = company_name;
            }
            if let Some(allowed_technologies) = assistant.allowed_technologies {
                self.assistant.allowed_technologies = allowed_technologies;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ONBOARD_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ONBOARD_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("ONBOARD_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ONBOARD_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("ONBOARD_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ONBOARD_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("ONBOARD_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("ONBOARD_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("ONBOARD_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("ONBOARD_LLM_TEMPERATURE") {
            self.llm.temperature = parse_env("ONBOARD_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("ONBOARD_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_env("ONBOARD_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("ONBOARD_LLM_MAX_TOOL_ROUNDS") {
            self.llm.max_tool_rounds = parse_env("ONBOARD_LLM_MAX_TOOL_ROUNDS", &value)?;
        }

        if let Some(value) = read_env("ONBOARD_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ONBOARD_SERVER_PORT") {
            self.server.port = parse_env("ONBOARD_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("ONBOARD_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("ONBOARD_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("ONBOARD_CALENDAR_PROVIDER") {
            self.calendar.provider = value.parse()?;
        }
        if let Some(value) = read_env("ONBOARD_CALENDAR_API_BASE_URL") {
            self.calendar.api_base_url = value;
        }
        if let Some(value) = read_env("ONBOARD_CALENDAR_ID") {
            self.calendar.calendar_id = value;
        }
        if let Some(value) = read_env("ONBOARD_CALENDAR_ACCESS_TOKEN") {
            self.calendar.access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("ONBOARD_CALENDAR_TIME_ZONE") {
            self.calendar.time_zone = value;
        }
        if let Some(value) = read_env("ONBOARD_CALENDAR_UTC_OFFSET") {
            self.calendar.utc_offset = value;
        }
        if let Some(value) = read_env("ONBOARD_CALENDAR_TOKEN_DIR") {
            self.calendar.token_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("ONBOARD_CALENDAR_ENFORCE_PERMISSIONS") {
            self.calendar.enforce_permissions =
                parse_env("ONBOARD_CALENDAR_ENFORCE_PERMISSIONS", &value)?;
        }

        if let Some(value) = read_env("ONBOARD_KNOWLEDGE_DOCUMENTS_DIR") {
            self.knowledge.documents_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("ONBOARD_KNOWLEDGE_TOP_K") {
            self.knowledge.top_k = parse_env("ONBOARD_KNOWLEDGE_TOP_K", &value)?;
        }

        let search_key =
            read_env("ONBOARD_SEARCH_API_KEY").or_else(|| read_env("TAVILY_API_KEY"));
        if let Some(value) = search_key {
            self.search.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("ONBOARD_SEARCH_MAX_RESULTS") {
            self.search.max_results = parse_env("ONBOARD_SEARCH_MAX_RESULTS", &value)?;
        }

        if let Some(value) = read_env("ONBOARD_ASSISTANT_COMPANY_NAME") {
            self.assistant.company_name = value;
        }
        if let Some(value) = read_env("ONBOARD_ASSISTANT_ALLOWED_TECHNOLOGIES") {
            self.assistant.allowed_technologies = value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect();
        }

        let log_level =
            read_env("ONBOARD_LOGGING_LEVEL").or_else(|| read_env("ONBOARD_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ONBOARD_LOGGING_FORMAT").or_else(|| read_env("ONBOARD_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(provider) = overrides.calendar_provider {
            self.calendar.provider = provider;
        }
        if let Some(documents_dir) = overrides.knowledge_documents_dir {
            self.knowledge.documents_dir = documents_dir;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_calendar(&self.calendar)?;
        validate_knowledge(&self.knowledge)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("onboard.toml"), PathBuf::from("config/onboard.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_tool_rounds == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tool_rounds must be greater than zero".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    match llm.provider {
        LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the openai provider".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {}
    }

    let endpoint = llm.endpoint();
    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_calendar(calendar: &CalendarConfig) -> Result<(), ConfigError> {
    calendar.offset()?;

    if calendar.provider == CalendarProviderKind::Google {
        let missing = calendar
            .access_token
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "calendar.access_token is required for the google provider".to_string(),
            ));
        }
        if !calendar.api_base_url.starts_with("http://")
            && !calendar.api_base_url.starts_with("https://")
        {
            return Err(ConfigError::Validation(
                "calendar.api_base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    let positive = [
        ("calendar.default_event_hours", calendar.default_event_hours),
        ("calendar.search_window_days", calendar.search_window_days),
        ("calendar.max_search_results", calendar.max_search_results),
        ("calendar.list_limit", calendar.list_limit),
    ];
    if let Some((key, _)) = positive.iter().find(|(_, value)| *value == 0) {
        return Err(ConfigError::Validation(format!("{key} must be greater than zero")));
    }

    Ok(())
}

fn validate_knowledge(knowledge: &KnowledgeConfig) -> Result<(), ConfigError> {
    if knowledge.chunk_size == 0 || knowledge.top_k == 0 {
        return Err(ConfigError::Validation(
            "knowledge.chunk_size and knowledge.top_k must be greater than zero".to_string(),
        ));
    }

    if knowledge.chunk_overlap >= knowledge.chunk_size {
        return Err(ConfigError::Validation(
            "knowledge.chunk_overlap must be smaller than knowledge.chunk_size".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    calendar: Option<CalendarPatch>,
    knowledge: Option<KnowledgePatch>,
    search: Option<SearchPatch>,
    assistant: Option<AssistantPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
    max_tool_rounds: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CalendarPatch {
    provider: Option<CalendarProviderKind>,
    api_base_url: Option<String>,
    calendar_id: Option<String>,
    access_token: Option<String>,
    time_zone: Option<String>,
    utc_offset: Option<String>,
    token_dir: Option<PathBuf>,
    enforce_permissions: Option<bool>,
    default_event_hours: Option<u32>,
    search_window_days: Option<u32>,
    max_search_results: Option<u32>,
    list_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgePatch {
    documents_dir: Option<PathBuf>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    top_k: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    max_results: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AssistantPatch {
    company_name: Option<String>,
    allowed_technologies: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
