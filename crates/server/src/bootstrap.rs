use std::sync::Arc;
use std::time::Duration;

use onboard_agent::{
    AgentRuntime, GuardrailPolicy, HelpSources, KnowledgeBase, LlmClient, OpenAiCompatibleClient,
    TavilySearch,
};
use onboard_calendar::{
    CalendarProvider, CalendarService, CalendarSettings, GoogleCalendarClient, InMemoryCalendar,
    ProviderError, TokenStore,
};
use onboard_core::clock::SystemClock;
use onboard_core::config::{AppConfig, CalendarProviderKind, ConfigError};
use onboard_db::{
    connect_with_config, migrations, DbPool, SqlConversationRepository, SqlUserRepository,
};
use thiserror::Error;
use tracing::info;

use crate::api::ApiState;
use crate::health::HealthState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub api: ApiState,
    pub health: HealthState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client setup failed: {0}")]
    Llm(String),
    #[error("calendar provider setup failed: {0}")]
    Calendar(#[source] ProviderError),
    #[error("knowledge base could not be loaded: {0}")]
    Knowledge(String),
    #[error("web search setup failed: {0}")]
    Search(String),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let timeout = Duration::from_secs(config.llm.timeout_secs);
    let llm: Arc<dyn LlmClient> = Arc::new(
        OpenAiCompatibleClient::from_config(&config.llm)
            .map_err(|error| BootstrapError::Llm(format!("{error:#}")))?,
    );

    let provider: Arc<dyn CalendarProvider> = match config.calendar.provider {
        CalendarProviderKind::Memory => Arc::new(InMemoryCalendar::default()),
        CalendarProviderKind::Google => Arc::new(
            GoogleCalendarClient::from_config(&config.calendar, timeout)
                .map_err(BootstrapError::Calendar)?,
        ),
    };
    let settings = CalendarSettings::from_config(&config.calendar)?;
    let clock = Arc::new(SystemClock::new(settings.offset));
    let calendar = CalendarService::new(provider, clock, settings);
    info!(
        event_name = "system.bootstrap.calendar_ready",
        correlation_id = "bootstrap",
        provider = calendar.provider_name(),
        enforce_permissions = config.calendar.enforce_permissions,
        "calendar provider initialized"
    );

    let knowledge = KnowledgeBase::load(&config.knowledge)
        .await
        .map_err(|error| BootstrapError::Knowledge(format!("{error:#}")))?
        .map(Arc::new);
    let web_search = TavilySearch::from_config(&config.search, timeout)
        .map_err(|error| BootstrapError::Search(format!("{error:#}")))?;

    let health = HealthState {
        db_pool: db_pool.clone(),
        calendar_provider: calendar.provider_name(),
        knowledge_chunks: knowledge.as_ref().map(|base| base.len()),
        web_search: web_search.is_some(),
    };

    let users = Arc::new(SqlUserRepository::new(db_pool.clone()));
    let runtime = AgentRuntime::new(
        llm,
        calendar,
        users.clone(),
        HelpSources { knowledge, web_search },
        GuardrailPolicy { enforce_permissions: config.calendar.enforce_permissions },
        config.assistant.clone(),
    )
    .with_max_tool_rounds(config.llm.max_tool_rounds)
    .with_history(Arc::new(SqlConversationRepository::new(db_pool.clone())));
    info!(
        event_name = "system.bootstrap.agents_ready",
        correlation_id = "bootstrap",
        help_tools = ?runtime.help_tools(),
        "agent runtime initialized"
    );

    let api = ApiState::new(
        users,
        Arc::new(runtime),
        TokenStore::new(config.calendar.token_dir.clone()),
    );

    Ok(Application { config, db_pool, api, health })
}
