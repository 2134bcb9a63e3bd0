use sqlx::MySqlPool;
use tracing::info;

const SCHEMA: &str = include_str!("schema.sql");

/// Create the `user` and `payment` tables if they are missing.
pub async fn ensure_schema(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    for statement in statements(SCHEMA) {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("mysql schema ready");
    Ok(())
}

fn statements(script: &str) -> impl Iterator<Item = &str> {
    script.split(';').map(str::trim).filter(|s| !s.is_empty())
}
