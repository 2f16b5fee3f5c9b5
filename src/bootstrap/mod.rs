//! Startup sequencing: wait for Postgres, then apply pending migrations
//! before the HTTP listener binds.

use diesel::{Connection, PgConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::time::Duration;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Blocks until the database accepts a connection, retrying `attempts` times
/// with `delay` between tries.
pub fn wait_for_database(
    database_url: &str,
    attempts: u32,
    delay: Duration,
) -> anyhow::Result<()> {
    let mut last_err = None;
    for attempt in 1..=attempts {
        match PgConnection::establish(database_url) {
            Ok(_) => return Ok(()),
            Err(e) => {
                log::warn!(
                    "database not ready (attempt {attempt}/{attempts}): {e}"
                );
                last_err = Some(e);
                std::thread::sleep(delay);
            }
        }
    }
    Err(anyhow::anyhow!(
        "database unreachable after {attempts} attempts: {}",
        last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no connection attempted".to_string())
    ))
}

pub fn run_migrations(conn: &mut PgConnection) -> anyhow::Result<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("failed to run migrations: {e}"))?;
    for migration in &applied {
        log::info!("applied migration {migration}");
    }
    Ok(())
}
