use onboard_core::config::{AppConfig, CalendarProviderKind};
use onboard_db::migrations;

use crate::commands::{open_pool, prepare, CommandResult};

/// Startup preflight: the server binary runs the same steps before it binds.
pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("start") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let applied = migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8));
        pool.close().await;
        applied
    });

    match result {
        Ok(()) => CommandResult::success("start", preflight_summary(&config)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("start", error_class, message, exit_code)
        }
    }
}

fn preflight_summary(config: &AppConfig) -> String {
    let calendar = match config.calendar.provider {
        CalendarProviderKind::Google => format!("google ({})", config.calendar.calendar_id),
        CalendarProviderKind::Memory => "memory".to_string(),
    };
    format!(
        "preflight passed: listen on {}:{}, llm {} at {}, calendar {}, permissions {}",
        config.server.bind_address,
        config.server.port,
        config.llm.model,
        config.llm.endpoint(),
        calendar,
        if config.calendar.enforce_permissions { "enforced" } else { "advisory" }
    )
}

#[cfg(test)]
mod tests {
    use onboard_core::config::AppConfig;

    use super::preflight_summary;

    #[test]
    fn summary_describes_default_local_setup() {
        let summary = preflight_summary(&AppConfig::default());

        assert_eq!(
            summary,
            "preflight passed: listen on 127.0.0.1:8000, llm llama3.1 at http://localhost:11434/v1, \
             calendar memory, permissions enforced"
        );
    }
}
