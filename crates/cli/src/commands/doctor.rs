use std::path::Path;

use onboard_core::config::{AppConfig, CalendarProviderKind, LoadOptions};
use onboard_db::connect_with_config;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 4] =
    ["database_connectivity", "llm_readiness", "calendar_readiness", "knowledge_documents"];

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_database_connectivity(&config));
            checks.push(check_llm(&config));
            checks.push(check_calendar(&config));
            checks.push(check_knowledge(&config.knowledge.documents_dir));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    summarize(checks)
}

fn summarize(checks: Vec<DoctorCheck>) -> DoctorReport {
    let failed = checks
        .iter()
        .any(|check| matches!(check.status, CheckStatus::Fail | CheckStatus::Skipped));
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = if failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else if warned {
        (CheckStatus::Warn, "doctor: ready with warnings")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;
        let users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .ok();
        pool.close().await;
        Ok::<Option<i64>, String>(users)
    });

    match result {
        Ok(Some(users)) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}` ({users} registered users)", config.database.url),
        },
        Ok(None) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Warn,
            details: "connected, but the users table is missing; run `onboard migrate`".to_string(),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn check_llm(config: &AppConfig) -> DoctorCheck {
    let key = if config.llm.api_key.is_some() {
        "api key configured"
    } else {
        "no api key (local endpoint)"
    };
    DoctorCheck {
        name: "llm_readiness",
        status: CheckStatus::Pass,
        details: format!(
            "{:?} model `{}` at {} ({key})",
            config.llm.provider,
            config.llm.model,
            config.llm.endpoint()
        ),
    }
}

fn check_calendar(config: &AppConfig) -> DoctorCheck {
    let provider = match config.calendar.provider {
        CalendarProviderKind::Google => "google",
        CalendarProviderKind::Memory => "memory",
    };
    let token_dir = &config.calendar.token_dir;
    if config.calendar.provider == CalendarProviderKind::Memory {
        return DoctorCheck {
            name: "calendar_readiness",
            status: CheckStatus::Warn,
            details: "memory provider: events are lost on restart".to_string(),
        };
    }
    if !token_dir.is_dir() {
        return DoctorCheck {
            name: "calendar_readiness",
            status: CheckStatus::Warn,
            details: format!(
                "{provider} provider; token directory `{}` does not exist yet",
                token_dir.display()
            ),
        };
    }
    DoctorCheck {
        name: "calendar_readiness",
        status: CheckStatus::Pass,
        details: format!("{provider} provider; tokens under `{}`", token_dir.display()),
    }
}

fn check_knowledge(dir: &Path) -> DoctorCheck {
    let documents = std::fs::read_dir(dir).map(|entries| {
        entries
            .filter_map(Result::ok)
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "txt" | "md" | "markdown"))
                    .unwrap_or(false)
            })
            .count()
    });

    match documents {
        Ok(0) | Err(_) => DoctorCheck {
            name: "knowledge_documents",
            status: CheckStatus::Warn,
            details: format!(
                "no documents under `{}`; knowledge search will be unavailable",
                dir.display()
            ),
        },
        Ok(count) => DoctorCheck {
            name: "knowledge_documents",
            status: CheckStatus::Pass,
            details: format!("{count} documents under `{}`", dir.display()),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::{check_knowledge, render_human, summarize, CheckStatus, DoctorCheck};

    fn check(name: &'static str, status: CheckStatus) -> DoctorCheck {
        DoctorCheck { name, status, details: String::new() }
    }

    #[test]
    fn warnings_do_not_fail_the_report() {
        let report = summarize(vec![
            check("config_validation", CheckStatus::Pass),
            check("knowledge_documents", CheckStatus::Warn),
        ]);

        assert_eq!(report.overall_status, CheckStatus::Warn);
        assert!(render_human(&report).contains("- [warn] knowledge_documents"));
    }

    #[test]
    fn skipped_checks_fail_the_report() {
        let report = summarize(vec![
            check("config_validation", CheckStatus::Fail),
            check("database_connectivity", CheckStatus::Skipped),
        ]);

        assert_eq!(report.overall_status, CheckStatus::Fail);
    }

    #[test]
    fn knowledge_check_counts_supported_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("handbook.md"), "# Handbook").expect("write");
        std::fs::write(dir.path().join("faq.txt"), "Q&A").expect("write");
        std::fs::write(dir.path().join("logo.png"), [0_u8; 4]).expect("write");

        let found = check_knowledge(dir.path());
        assert_eq!(found.status, CheckStatus::Pass);
        assert!(found.details.starts_with("2 documents"));

        let missing = check_knowledge(&dir.path().join("nope"));
        assert_eq!(missing.status, CheckStatus::Warn);
    }
}
