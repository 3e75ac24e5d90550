//! PostGIS sink and schema management.

use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use tracing::info;

use crate::error::StoreError;

use super::{BatchSink, Record};

pub const SCHEMA: &str = "storms";

/// Postgres caps a statement at 65535 bind parameters.
const MAX_BIND_PARAMS: usize = 65_535;

pub async fn connect(database_url: &str) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await?;

    info!("Connected to database");

    Ok(pool)
}

/// Writes each batch in its own transaction.
pub struct PgSink<'a> {
    pool: &'a PgPool,
}

impl<'a> PgSink<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        PgSink { pool }
    }
}

impl<R: Record> BatchSink<R> for PgSink<'_> {
    async fn write_batch(&mut self, batch: &[R]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for rows in batch.chunks(rows_per_statement::<R>()) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(insert_clause::<R>());
            qb.push_values(rows, |mut b, record| record.bind(&mut b));
            qb.push(conflict_clause::<R>());

            qb.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        Ok(())
    }
}

pub fn rows_per_statement<R: Record>() -> usize {
    (MAX_BIND_PARAMS / R::COLUMNS.len()).max(1)
}

fn insert_clause<R: Record>() -> String {
    format!(
        "INSERT INTO {}.{} ({}) ",
        SCHEMA,
        R::TABLE,
        R::COLUMNS.join(", ")
    )
}

fn conflict_clause<R: Record>() -> String {
    let updates: Vec<String> = R::COLUMNS
        .iter()
        .filter(|c| !R::CONFLICT_KEY.contains(*c) && **c != R::ID_COLUMN)
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();

    format!(
        " ON CONFLICT ({}) DO UPDATE SET {}",
        R::CONFLICT_KEY.join(", "),
        updates.join(", ")
    )
}

// -- Schema ------------------------------------------------------------------

const TRACK_COLUMNS_DDL: &str = "
    point_id UUID PRIMARY KEY,
    storm_id UUID NOT NULL REFERENCES storms.storms (storm_id) ON DELETE CASCADE,
    valid_time TIMESTAMPTZ NOT NULL,
    latitude DOUBLE PRECISION NOT NULL,
    longitude DOUBLE PRECISION NOT NULL,
    geometry geometry(Point, 4326) NOT NULL,
    wind_speed DOUBLE PRECISION,
    pressure DOUBLE PRECISION,
    gust_speed DOUBLE PRECISION,
    max_wind_radius DOUBLE PRECISION,
    last_closed_isobar_radius DOUBLE PRECISION,
    last_closed_isobar_pressure DOUBLE PRECISION,
    quadrant_radius_34 DOUBLE PRECISION[],
    quadrant_radius_50 DOUBLE PRECISION[],
    quadrant_radius_64 DOUBLE PRECISION[],
    nature TEXT,
    basin TEXT,
    provider TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()";

/// Statements creating the schema. Each is idempotent.
pub fn schema_statements() -> Vec<String> {
    vec![
        "CREATE EXTENSION IF NOT EXISTS postgis".to_string(),
        format!("CREATE SCHEMA IF NOT EXISTS {SCHEMA}"),
        format!(
            "CREATE TABLE IF NOT EXISTS {SCHEMA}.storms (
                storm_id UUID PRIMARY KEY,
                sid TEXT NOT NULL,
                source TEXT NOT NULL,
                atcf_id TEXT,
                number INTEGER,
                season INTEGER,
                name TEXT,
                genesis_basin TEXT,
                provisional BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT uq_storm UNIQUE (sid, source)
            )"
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_storms_name ON {SCHEMA}.storms (name)"),
        format!(
            "CREATE TABLE IF NOT EXISTS {SCHEMA}.observed_tracks ({TRACK_COLUMNS_DDL},
                CONSTRAINT uq_observed_track UNIQUE (storm_id, valid_time, provider)
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {SCHEMA}.forecast_tracks ({TRACK_COLUMNS_DDL},
                issue_time TIMESTAMPTZ NOT NULL,
                lead_time INTEGER NOT NULL,
                CONSTRAINT uq_forecast_track UNIQUE (storm_id, issue_time, valid_time, provider)
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {SCHEMA}.forecast_track_ensembles ({TRACK_COLUMNS_DDL},
                issue_time TIMESTAMPTZ NOT NULL,
                lead_time INTEGER NOT NULL,
                ensemble_member INTEGER NOT NULL,
                CONSTRAINT uq_ensemble_track UNIQUE (storm_id, issue_time, valid_time, ensemble_member, provider)
            )"
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_observed_tracks_geometry ON {SCHEMA}.observed_tracks USING GIST (geometry)"),
        format!("CREATE INDEX IF NOT EXISTS idx_forecast_tracks_geometry ON {SCHEMA}.forecast_tracks USING GIST (geometry)"),
        format!("CREATE INDEX IF NOT EXISTS idx_ensemble_tracks_geometry ON {SCHEMA}.forecast_track_ensembles USING GIST (geometry)"),
        format!("CREATE INDEX IF NOT EXISTS idx_forecast_tracks_times ON {SCHEMA}.forecast_tracks (issue_time, valid_time)"),
        format!("CREATE INDEX IF NOT EXISTS idx_ensemble_tracks_storm_issue ON {SCHEMA}.forecast_track_ensembles (storm_id, issue_time)"),
    ]
}

pub async fn init_schema(pool: &PgPool) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;
    for statement in schema_statements() {
        sqlx::query(&statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    info!("Schema `{}` is ready", SCHEMA);

    Ok(())
}

pub async fn drop_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query(&format!("DROP SCHEMA IF EXISTS {SCHEMA} CASCADE"))
        .execute(pool)
        .await?;

    info!("Schema `{}` dropped", SCHEMA);

    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::model::{EnsembleTrack, Storm};

    use super::*;

    #[test]
    fn should_update_everything_but_key_and_id() {
        let clause = conflict_clause::<Storm>();

        assert!(clause.starts_with(" ON CONFLICT (sid, source) DO UPDATE SET "));
        assert!(clause.contains("name = EXCLUDED.name"));
        assert!(!clause.contains("storm_id = "));
        assert!(!clause.contains("sid = EXCLUDED.sid"));
    }

    #[test]
    fn should_stay_under_bind_limit() {
        let rows = rows_per_statement::<EnsembleTrack>();

        assert!(rows * EnsembleTrack::COLUMNS.len() <= MAX_BIND_PARAMS);
        assert!((rows + 1) * EnsembleTrack::COLUMNS.len() > MAX_BIND_PARAMS);
    }

    #[test]
    fn should_qualify_insert_with_schema() {
        assert!(insert_clause::<Storm>().starts_with("INSERT INTO storms.storms (storm_id, sid, "));
    }

    #[test]
    fn should_create_every_table_idempotently() {
        let statements = schema_statements();

        for table in ["storms", "observed_tracks", "forecast_tracks", "forecast_track_ensembles"] {
            assert!(statements
                .iter()
                .any(|s| s.contains(&format!("CREATE TABLE IF NOT EXISTS storms.{table} ("))));
        }
        assert!(statements.iter().all(|s| s.contains("IF NOT EXISTS")));
    }

    #[tokio::test]
    #[ignore]
    async fn should_upsert_into_postgis() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let pool = connect(&url).await.unwrap();
        init_schema(&pool).await.unwrap();

        let storm = Storm::new(crate::model::Source::Nhc, "AL102023");
        let mut sink = PgSink::new(&pool);
        sink.write_batch(&[storm.clone()]).await.unwrap();
        sink.write_batch(&[storm]).await.unwrap();
    }
}
