use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use onboard_db::DbPool;
use serde::Serialize;

/// What `/health` reports besides the database probe. Only the database decides readiness;
/// the other checks describe which integrations the running process was built with.
#[derive(Clone)]
pub struct HealthState {
    pub db_pool: DbPool,
    pub calendar_provider: &'static str,
    pub knowledge_chunks: Option<usize>,
    pub web_search: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    pub calendar: HealthCheck,
    pub knowledge: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let knowledge = match state.knowledge_chunks {
        Some(chunks) => HealthCheck {
            status: "ready",
            detail: format!(
                "{chunks} indexed chunks; web search {}",
                if state.web_search { "enabled" } else { "disabled" }
            ),
        },
        None => HealthCheck {
            status: "disabled",
            detail: format!(
                "no knowledge documents loaded; web search {}",
                if state.web_search { "enabled" } else { "disabled" }
            ),
        },
    };

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        calendar: HealthCheck {
            status: "ready",
            detail: format!("{} calendar provider", state.calendar_provider),
        },
        knowledge,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users").fetch_one(pool).await {
        Ok(users) => {
            HealthCheck { status: "ready", detail: format!("{users} registered users") }
        }
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}
