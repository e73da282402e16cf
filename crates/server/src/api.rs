use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use onboard_agent::{AgentRuntime, UserContext};
use onboard_calendar::TokenStore;
use onboard_core::domain::permission::{PermissionLevel, PermissionSet};
use onboard_core::domain::user::{User, Username};
use onboard_core::errors::{ApplicationError, InterfaceError};
use onboard_db::{RepositoryError, UserRepository};

use crate::session::SessionStore;

pub const TOKEN_HEADER: &str = "token";

const USER_EXISTS: &str = "User already exists.";
const EMAIL_EXISTS: &str = "Email is already registered.";
const REGISTERED: &str = "User registered successfully.";
const BAD_CREDENTIALS: &str = "Incorrect username or password.";
const INVALID_TOKEN: &str = "Invalid token";

#[derive(Clone)]
pub struct ApiState {
    users: Arc<dyn UserRepository>,
    sessions: Arc<SessionStore>,
    runtime: Arc<AgentRuntime>,
    tokens: TokenStore,
}

impl ApiState {
    pub fn new(users: Arc<dyn UserRepository>, runtime: Arc<AgentRuntime>, tokens: TokenStore) -> Self {
        Self { users, sessions: Arc::new(SessionStore::default()), runtime, tokens }
    }

    async fn session(&self, headers: &HeaderMap) -> Result<UserContext, ApiFailure> {
        let token = headers.get(TOKEN_HEADER).and_then(|value| value.to_str().ok()).unwrap_or("");
        match self.sessions.get(token).await {
            Some(user) => Ok(user),
            None => Err(failure(StatusCode::UNAUTHORIZED, INVALID_TOKEN)),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub permission_level: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Accepted for compatibility; the session's user is authoritative.
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub permission_level: PermissionLevel,
    pub permissions: PermissionSet,
    pub calendar_auth: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetResponse {
    pub message: String,
    pub removed: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

type ApiFailure = (StatusCode, Json<ApiError>);

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/reset_calendar_auth", post(reset_calendar_auth))
        .route("/chat", post(chat))
        .with_state(state)
}

async fn register(
    State(state): State<ApiState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, ApiFailure> {
    let user = User::register(&body.username, &body.email, &body.password, Utc::now())
        .map_err(|error| interface_failure(ApplicationError::from(error)))?;
    let username = user.username.to_string();

    match state.users.create(user).await {
        Ok(()) => {
            info!(event_name = "api.user.registered", username = %username, "user registered");
            Ok(Json(MessageResponse { message: REGISTERED.to_string() }))
        }
        Err(RepositoryError::Duplicate(field)) if field == "email" => {
            Err(failure(StatusCode::BAD_REQUEST, EMAIL_EXISTS))
        }
        Err(RepositoryError::Duplicate(_)) => Err(failure(StatusCode::BAD_REQUEST, USER_EXISTS)),
        Err(error) => Err(interface_failure(ApplicationError::from(error))),
    }
}

async fn login(
    State(state): State<ApiState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiFailure> {
    let level = match body.permission_level.as_deref().map(str::trim) {
        None | Some("") => PermissionLevel::default(),
        Some(raw) => raw
            .parse::<PermissionLevel>()
            .map_err(|error| interface_failure(ApplicationError::from(error)))?,
    };

    let Ok(username) = Username::parse(&body.username) else {
        return Err(failure(StatusCode::BAD_REQUEST, BAD_CREDENTIALS));
    };
    let user = state
        .users
        .find_by_username(&username)
        .await
        .map_err(|error| interface_failure(ApplicationError::from(error)))?;
    let Some(user) = user.filter(|user| user.password.verify(&body.password)) else {
        info!(event_name = "api.login.rejected", username = %username, "login rejected");
        return Err(failure(StatusCode::BAD_REQUEST, BAD_CREDENTIALS));
    };

    let calendar_auth = match state.tokens.is_authorized(user.email.as_str(), level).await {
        Ok(authorized) => authorized,
        Err(error) => {
            warn!(
                event_name = "api.login.calendar_auth_unknown",
                username = %username,
                error = %error,
                "could not check stored calendar authorization"
            );
            false
        }
    };

    let context = UserContext::new(username.as_str(), user.email.as_str(), level);
    let token = state.sessions.open(context).await;
    let open_sessions = state.sessions.len().await;
    info!(
        event_name = "api.login.accepted",
        username = %username,
        permission_level = %level,
        calendar_auth,
        open_sessions,
        "session opened"
    );

    Ok(Json(LoginResponse {
        message: format!("Welcome {username}"),
        token,
        permission_level: level,
        permissions: level.capabilities(),
        calendar_auth,
    }))
}

async fn reset_calendar_auth(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<ResetResponse>, ApiFailure> {
    let user = state.session(&headers).await?;
    let removed = state.tokens.reset(&user.email).await.map_err(|error| {
        interface_failure(ApplicationError::Integration(error.to_string()))
    })?;

    Ok(Json(ResetResponse { message: "Calendar authentication reset.".to_string(), removed }))
}

async fn chat(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiFailure> {
    let user = state.session(&headers).await?;
    if let Some(claimed) = body.username.as_deref() {
        if !claimed.trim().eq_ignore_ascii_case(&user.username) {
            warn!(
                event_name = "api.chat.username_mismatch",
                username = %user.username,
                claimed = %claimed,
                "ignoring username that does not match the session"
            );
        }
    }

    let response = state.runtime.handle_message(&user, &body.message).await;
    Ok(Json(ChatResponse { response }))
}

fn failure(status: StatusCode, detail: &str) -> ApiFailure {
    (status, Json(ApiError { detail: detail.to_string(), correlation_id: None }))
}

fn interface_failure(error: ApplicationError) -> ApiFailure {
    let interface = error.into_interface(Uuid::new_v4().to_string());
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };
    let detail = interface.user_message().to_string();
    if status != StatusCode::BAD_REQUEST {
        warn!(
            event_name = "api.request.failed",
            correlation_id = %interface.correlation_id(),
            error = %interface,
            "request failed"
        );
    }
    (status, Json(ApiError { detail, correlation_id: Some(interface.correlation_id().to_string()) }))
}
