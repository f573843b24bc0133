use crate::{
    api,
    cli::commands::database::redact_dsn,
    storage::{DynStudentRepository, MemoryStudentRepository, PgStudentRepository},
};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub db_max_connections: u32,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let repository: DynStudentRepository = match &args.dsn {
        Some(dsn) => {
            info!("Connecting to {}", redact_dsn(dsn));

            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(args.db_max_connections)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(dsn)
                .await
                .context("Failed to connect to database")?;

            Arc::new(PgStudentRepository::new(pool))
        }
        None => {
            warn!("No DSN configured, students are kept in memory");
            Arc::new(MemoryStudentRepository::new())
        }
    };

    api::new(args.port, repository).await
}
