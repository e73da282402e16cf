use onboard_db::{migrations, DbPool, DemoUserSeed, SeedResult};

use crate::commands::{open_pool, prepare, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;

        let outcome = seed_users(&pool).await;

        pool.close().await;
        outcome
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", summary(&seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

async fn seed_users(pool: &DbPool) -> Result<SeedResult, StepFailure> {
    migrations::run_pending(pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;

    let seeded =
        DemoUserSeed::load(pool).await.map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

    let verification = DemoUserSeed::verify(pool)
        .await
        .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
    if !verification.all_present {
        let failed = verification
            .checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect::<Vec<_>>();
        return Err(("seed_verification", verification_message(&failed), 6));
    }
    Ok(seeded)
}

fn summary(seeded: &SeedResult) -> String {
    let users = DemoUserSeed::describe()
        .into_iter()
        .map(|(username, description)| format!("  - {username}: {description}"))
        .collect::<Vec<_>>();
    format!(
        "demo users ready (seeded {}, already present {}):\n{}",
        seeded.users_seeded.len(),
        seeded.users_skipped.len(),
        users.join("\n")
    )
}

fn verification_message(failed: &[&str]) -> String {
    if failed.is_empty() {
        "Some demo users failed to load".to_string()
    } else {
        format!("Demo user verification failed for: {}", failed.join(", "))
    }
}
