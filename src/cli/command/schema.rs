use anyhow::{bail, Result};
use sqlx::PgPool;

use crate::{
    config::{Mode, Settings},
    db::postgres,
    error::ConfigError,
};

async fn connect(mode: Mode) -> Result<PgPool> {
    if mode == Mode::Local {
        bail!("Local mode writes Parquet files and has no database schema");
    }
    let settings = Settings::from_env(mode)?;
    let url = settings
        .database_url
        .ok_or_else(|| ConfigError::Missing("DATABASE_URL".to_string()))?;

    Ok(postgres::connect(&url).await?)
}

/// Creates the PostGIS extension, schema, tables and indexes.
pub async fn init_db(mode: Mode) -> Result<()> {
    let pool = connect(mode).await?;
    postgres::init_schema(&pool).await?;

    Ok(())
}

/// Drops the schema. Refuses unless `confirmed`.
pub async fn teardown(mode: Mode, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("Refusing to drop schema `{}` without --yes", postgres::SCHEMA);
    }
    let pool = connect(mode).await?;
    postgres::drop_schema(&pool).await?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_refuse_teardown_without_confirmation() {
        let err = teardown(Mode::Dev, false).await.unwrap_err();

        assert!(err.to_string().contains("--yes"));
    }

    #[tokio::test]
    async fn should_refuse_schema_in_local_mode() {
        assert!(init_db(Mode::Local).await.is_err());
    }
}
