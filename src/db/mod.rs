//! Batched upserts of record sets into their destination tables.

pub mod postgres;
pub mod records;

use std::{collections::HashMap, path::PathBuf};

use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::{
    cli::create_progress_bar,
    error::{StoreError, WriteError},
    parquet::{Columnar, ParquetSink},
};

pub use postgres::PgSink;
pub use records::Record;

pub const DEFAULT_CHUNKSIZE: usize = 10_000;

/// Destination that accepts one batch at a time. Every successful call is
/// durable on its own. `finish` runs after the last batch, and also after a
/// failed one so that earlier batches stay readable.
#[allow(async_fn_in_trait)]
pub trait BatchSink<R> {
    async fn write_batch(&mut self, batch: &[R]) -> Result<(), StoreError>;

    async fn finish(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub rows: usize,
    pub batches: usize,
}

/// Keeps the last record per natural key, at the position it first appeared.
pub fn dedupe_last_wins<R: Record>(rows: Vec<R>) -> Vec<R> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut unique: Vec<R> = Vec::with_capacity(rows.len());

    for row in rows {
        match index.get(&row.natural_key()) {
            Some(&i) => unique[i] = row,
            None => {
                index.insert(row.natural_key(), unique.len());
                unique.push(row);
            }
        }
    }

    unique
}

/// Deduplicates `rows` and writes them in batches of `chunksize`. A failing
/// batch stops the run; batches already written stay written and the sink is
/// still finished.
pub async fn upsert_in_batches<R, S>(
    sink: &mut S,
    rows: Vec<R>,
    chunksize: usize,
) -> Result<WriteSummary, WriteError>
where
    R: Record,
    S: BatchSink<R>,
{
    let total = rows.len();
    let rows = dedupe_last_wins(rows);
    if rows.len() < total {
        debug!("{}: collapsed {} duplicate rows", R::TABLE, total - rows.len());
    }

    let mut summary = WriteSummary::default();
    if rows.is_empty() {
        info!("{}: nothing to write", R::TABLE);
        return Ok(summary);
    }

    let pb = create_progress_bar(rows.len() as u64, format!("Writing {}", R::TABLE));

    for batch in rows.chunks(chunksize.max(1)) {
        if let Err(source) = sink.write_batch(batch).await {
            if let Err(e) = sink.finish().await {
                warn!("{}: could not close after failed batch: {}", R::TABLE, e);
            }
            return Err(WriteError::Batch {
                table: R::TABLE,
                batch: summary.batches + 1,
                committed: summary.rows,
                source,
            });
        }

        summary.rows += batch.len();
        summary.batches += 1;
        pb.inc(batch.len() as u64);
        debug!("{}: batch {} ({} rows) written", R::TABLE, summary.batches, batch.len());
    }

    sink.finish().await.map_err(|source| WriteError::Close {
        table: R::TABLE,
        source,
    })?;
    pb.finish_with_message(format!("{} updated", R::TABLE));

    info!("{}: upserted {} rows in {} batches", R::TABLE, summary.rows, summary.batches);

    Ok(summary)
}

/// Where normalized records end up.
pub enum Store {
    Postgres(PgPool),
    /// Local mode: `<dir>/<table>/<unit>.parquet`.
    Parquet(PathBuf),
}

impl Store {
    /// Upserts one record set. `unit` names the unit of work (dataset, day,
    /// year and basin) and only matters for Parquet output.
    pub async fn upsert<R>(
        &self,
        unit: &str,
        rows: Vec<R>,
        chunksize: usize,
    ) -> Result<WriteSummary, WriteError>
    where
        R: Record + Columnar,
    {
        match self {
            Store::Postgres(pool) => {
                let mut sink = PgSink::new(pool);
                upsert_in_batches(&mut sink, rows, chunksize).await
            }
            Store::Parquet(dir) => {
                if rows.is_empty() {
                    info!("{}: nothing to write", R::TABLE);
                    return Ok(WriteSummary::default());
                }
                let path = dir.join(R::TABLE).join(format!("{}.parquet", unit));
                let mut sink = ParquetSink::<R>::create(&path).map_err(|source| WriteError::Open {
                    table: R::TABLE,
                    source,
                })?;
                let summary = upsert_in_batches(&mut sink, rows, chunksize).await?;
                info!("{}: saved to `{}`", R::TABLE, path.display());

                Ok(summary)
            }
        }
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::TempDir;

    use crate::model::{storm_id, ObservedTrack, Source, TrackPoint};

    use super::*;

    /// Keeps rows keyed on their natural key, like a table with a unique
    /// constraint.
    #[derive(Default)]
    struct MemorySink {
        rows: HashMap<String, ObservedTrack>,
        batch_sizes: Vec<usize>,
        fail_on: Option<usize>,
        finished: bool,
    }

    impl BatchSink<ObservedTrack> for MemorySink {
        async fn write_batch(&mut self, batch: &[ObservedTrack]) -> Result<(), StoreError> {
            if self.fail_on == Some(self.batch_sizes.len() + 1) {
                return Err(StoreError::Io(std::io::Error::other("connection reset")));
            }
            for row in batch {
                self.rows.insert(row.natural_key(), row.clone());
            }
            self.batch_sizes.push(batch.len());
            Ok(())
        }

        async fn finish(&mut self) -> Result<(), StoreError> {
            self.finished = true;
            Ok(())
        }
    }

    /// Parquet output whose disk fills up on batch `fail_on`.
    struct FullDiskSink {
        inner: ParquetSink<ObservedTrack>,
        written: usize,
        fail_on: usize,
    }

    impl BatchSink<ObservedTrack> for FullDiskSink {
        async fn write_batch(&mut self, batch: &[ObservedTrack]) -> Result<(), StoreError> {
            if self.written + 1 == self.fail_on {
                return Err(StoreError::Io(std::io::Error::other("no space left on device")));
            }
            self.inner.write_batch(batch).await?;
            self.written += 1;
            Ok(())
        }

        async fn finish(&mut self) -> Result<(), StoreError> {
            self.inner.finish().await
        }
    }

    fn tracks_fixture(n: usize) -> Vec<ObservedTrack> {
        let start = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let storm = storm_id(Source::Ibtracs, "2000001N10100");

        (0..n)
            .map(|i| {
                let time = start + Duration::hours(i as i64);
                let mut point = TrackPoint::new(storm, time, 10.0, 100.0, "tokyo");
                point.wind_speed = Some(i as f64);
                ObservedTrack::new(point)
            })
            .collect()
    }

    #[tokio::test]
    async fn should_split_into_bounded_batches() {
        let mut sink = MemorySink::default();

        let summary = upsert_in_batches(&mut sink, tracks_fixture(25_000), 10_000)
            .await
            .unwrap();

        assert_eq!(sink.batch_sizes, vec![10_000, 10_000, 5_000]);
        assert_eq!(summary, WriteSummary { rows: 25_000, batches: 3 });
        assert!(sink.finished);
    }

    #[tokio::test]
    async fn should_keep_committed_batches_when_a_batch_fails() {
        let mut sink = MemorySink {
            fail_on: Some(2),
            ..Default::default()
        };

        let result = upsert_in_batches(&mut sink, tracks_fixture(25_000), 10_000).await;

        match result {
            Err(WriteError::Batch { batch, committed, .. }) => {
                assert_eq!(batch, 2);
                assert_eq!(committed, 10_000);
            }
            other => panic!("expected batch failure, got {:?}", other),
        }
        // batch 3 never attempted
        assert_eq!(sink.batch_sizes, vec![10_000]);
        assert_eq!(sink.rows.len(), 10_000);
        assert!(sink.finished);
    }

    #[tokio::test]
    async fn should_leave_readable_parquet_when_a_batch_fails() {
        // arrange
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("observed_track").join("unit.parquet");
        let mut sink = FullDiskSink {
            inner: ParquetSink::create(&path).unwrap(),
            written: 0,
            fail_on: 3,
        };

        // act
        let result = upsert_in_batches(&mut sink, tracks_fixture(10), 4).await;

        // assert
        assert!(matches!(result, Err(WriteError::Batch { batch: 3, committed: 8, .. })));
        let file = std::fs::File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let rows: usize = reader.map(|batch| batch.unwrap().num_rows()).sum();
        assert_eq!(rows, 8);
    }

    #[tokio::test]
    async fn should_leave_same_rows_when_written_twice() {
        let mut sink = MemorySink::default();

        upsert_in_batches(&mut sink, tracks_fixture(500), 64).await.unwrap();
        let first = sink.rows.clone();
        upsert_in_batches(&mut sink, tracks_fixture(500), 64).await.unwrap();

        assert_eq!(sink.rows, first);
        assert_eq!(sink.rows.len(), 500);
    }

    #[tokio::test]
    async fn should_skip_empty_record_sets() {
        let mut sink = MemorySink::default();

        let summary = upsert_in_batches(&mut sink, Vec::new(), 10).await.unwrap();

        assert_eq!(summary, WriteSummary::default());
        assert!(sink.batch_sizes.is_empty());
        assert!(!sink.finished);
    }

    #[test]
    fn should_dedupe_with_last_write_winning() {
        let mut rows = tracks_fixture(3);
        let mut replacement = rows[0].clone();
        replacement.point.wind_speed = Some(99.0);
        rows.push(replacement);

        let unique = dedupe_last_wins(rows);

        assert_eq!(unique.len(), 3);
        assert_eq!(unique[0].point.wind_speed, Some(99.0));
    }
}
