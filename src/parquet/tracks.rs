//! Arrow layout of the three track tables.

use std::sync::{Arc, OnceLock};

use arrow::{
    array::{
        ArrayRef, Float64Builder, Int32Builder, ListBuilder, StringBuilder,
        TimestampMicrosecondBuilder,
    },
    datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit},
    error::ArrowError,
    record_batch::RecordBatch,
};
use chrono::{DateTime, Utc};

use crate::model::{EnsembleTrack, ForecastTrack, ObservedTrack, QuadrantRadii, TrackPoint};

use super::Columnar;

fn timestamp() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

fn radii() -> DataType {
    DataType::List(Arc::new(Field::new("item", DataType::Float64, true)))
}

fn track_fields() -> Vec<Field> {
    vec![
        Field::new("point_id", DataType::Utf8, false),
        Field::new("storm_id", DataType::Utf8, false),
        Field::new("valid_time", timestamp(), false),
        Field::new("latitude", DataType::Float64, false),
        Field::new("longitude", DataType::Float64, false),
        Field::new("geometry", DataType::Utf8, false),
        Field::new("wind_speed", DataType::Float64, true),
        Field::new("pressure", DataType::Float64, true),
        Field::new("gust_speed", DataType::Float64, true),
        Field::new("max_wind_radius", DataType::Float64, true),
        Field::new("last_closed_isobar_radius", DataType::Float64, true),
        Field::new("last_closed_isobar_pressure", DataType::Float64, true),
        Field::new("quadrant_radius_34", radii(), true),
        Field::new("quadrant_radius_50", radii(), true),
        Field::new("quadrant_radius_64", radii(), true),
        Field::new("nature", DataType::Utf8, true),
        Field::new("basin", DataType::Utf8, true),
        Field::new("provider", DataType::Utf8, false),
    ]
}

/// Builders for the columns every track table shares.
struct TrackColumns {
    point_id: StringBuilder,
    storm_id: StringBuilder,
    valid_time: TimestampMicrosecondBuilder,
    latitude: Float64Builder,
    longitude: Float64Builder,
    geometry: StringBuilder,
    wind_speed: Float64Builder,
    pressure: Float64Builder,
    gust_speed: Float64Builder,
    max_wind_radius: Float64Builder,
    roci: Float64Builder,
    poci: Float64Builder,
    r34: ListBuilder<Float64Builder>,
    r50: ListBuilder<Float64Builder>,
    r64: ListBuilder<Float64Builder>,
    nature: StringBuilder,
    basin: StringBuilder,
    provider: StringBuilder,
}

impl TrackColumns {
    fn with_capacity(n: usize) -> Self {
        TrackColumns {
            point_id: StringBuilder::with_capacity(n, n * 36),
            storm_id: StringBuilder::with_capacity(n, n * 36),
            valid_time: TimestampMicrosecondBuilder::with_capacity(n).with_timezone("UTC"),
            latitude: Float64Builder::with_capacity(n),
            longitude: Float64Builder::with_capacity(n),
            geometry: StringBuilder::with_capacity(n, n * 24),
            wind_speed: Float64Builder::with_capacity(n),
            pressure: Float64Builder::with_capacity(n),
            gust_speed: Float64Builder::with_capacity(n),
            max_wind_radius: Float64Builder::with_capacity(n),
            roci: Float64Builder::with_capacity(n),
            poci: Float64Builder::with_capacity(n),
            r34: ListBuilder::new(Float64Builder::new()),
            r50: ListBuilder::new(Float64Builder::new()),
            r64: ListBuilder::new(Float64Builder::new()),
            nature: StringBuilder::with_capacity(n, n * 2),
            basin: StringBuilder::with_capacity(n, n * 2),
            provider: StringBuilder::with_capacity(n, n * 8),
        }
    }

    fn append(&mut self, point_id: &uuid::Uuid, point: &TrackPoint) {
        self.point_id.append_value(point_id.to_string());
        self.storm_id.append_value(point.storm_id.to_string());
        self.valid_time.append_value(micros(&point.valid_time));
        self.latitude.append_value(point.latitude);
        self.longitude.append_value(point.longitude);
        self.geometry.append_value(point.wkt());
        self.wind_speed.append_option(point.wind_speed);
        self.pressure.append_option(point.pressure);
        self.gust_speed.append_option(point.gust_speed);
        self.max_wind_radius.append_option(point.max_wind_radius);
        self.roci.append_option(point.last_closed_isobar_radius);
        self.poci.append_option(point.last_closed_isobar_pressure);
        append_radii(&mut self.r34, point.quadrant_radius_34);
        append_radii(&mut self.r50, point.quadrant_radius_50);
        append_radii(&mut self.r64, point.quadrant_radius_64);
        self.nature.append_option(point.nature.as_deref());
        self.basin.append_option(point.basin.as_deref());
        self.provider.append_value(&point.provider);
    }

    fn finish(mut self) -> Vec<ArrayRef> {
        vec![
            Arc::new(self.point_id.finish()),
            Arc::new(self.storm_id.finish()),
            Arc::new(self.valid_time.finish()),
            Arc::new(self.latitude.finish()),
            Arc::new(self.longitude.finish()),
            Arc::new(self.geometry.finish()),
            Arc::new(self.wind_speed.finish()),
            Arc::new(self.pressure.finish()),
            Arc::new(self.gust_speed.finish()),
            Arc::new(self.max_wind_radius.finish()),
            Arc::new(self.roci.finish()),
            Arc::new(self.poci.finish()),
            Arc::new(self.r34.finish()),
            Arc::new(self.r50.finish()),
            Arc::new(self.r64.finish()),
            Arc::new(self.nature.finish()),
            Arc::new(self.basin.finish()),
            Arc::new(self.provider.finish()),
        ]
    }
}

fn micros(time: &DateTime<Utc>) -> i64 {
    time.timestamp_micros()
}

fn append_radii(builder: &mut ListBuilder<Float64Builder>, radii: Option<QuadrantRadii>) {
    match radii {
        Some(values) => {
            for value in values {
                builder.values().append_option(value);
            }
            builder.append(true);
        }
        None => builder.append_null(),
    }
}

fn cached(cell: &'static OnceLock<SchemaRef>, extra: fn() -> Vec<Field>) -> SchemaRef {
    cell.get_or_init(|| {
        let mut fields = track_fields();
        fields.extend(extra());
        Arc::new(Schema::new(fields))
    })
    .clone()
}

impl Columnar for ObservedTrack {
    fn schema() -> SchemaRef {
        static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
        cached(&SCHEMA, Vec::new)
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        let mut columns = TrackColumns::with_capacity(rows.len());
        for row in rows {
            columns.append(&row.point_id, &row.point);
        }

        RecordBatch::try_new(Self::schema(), columns.finish())
    }
}

impl Columnar for ForecastTrack {
    fn schema() -> SchemaRef {
        static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
        cached(&SCHEMA, || {
            vec![
                Field::new("issue_time", timestamp(), false),
                Field::new("lead_time", DataType::Int32, false),
            ]
        })
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        let mut columns = TrackColumns::with_capacity(rows.len());
        let mut issue_time = TimestampMicrosecondBuilder::with_capacity(rows.len()).with_timezone("UTC");
        let mut lead_time = Int32Builder::with_capacity(rows.len());
        for row in rows {
            columns.append(&row.point_id, &row.point);
            issue_time.append_value(micros(&row.issue_time));
            lead_time.append_value(row.lead_time());
        }

        let mut arrays = columns.finish();
        arrays.push(Arc::new(issue_time.finish()));
        arrays.push(Arc::new(lead_time.finish()));

        RecordBatch::try_new(Self::schema(), arrays)
    }
}

impl Columnar for EnsembleTrack {
    fn schema() -> SchemaRef {
        static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
        cached(&SCHEMA, || {
            vec![
                Field::new("issue_time", timestamp(), false),
                Field::new("lead_time", DataType::Int32, false),
                Field::new("ensemble_member", DataType::Int32, false),
            ]
        })
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        let mut columns = TrackColumns::with_capacity(rows.len());
        let mut issue_time = TimestampMicrosecondBuilder::with_capacity(rows.len()).with_timezone("UTC");
        let mut lead_time = Int32Builder::with_capacity(rows.len());
        let mut member = Int32Builder::with_capacity(rows.len());
        for row in rows {
            columns.append(&row.point_id, &row.point);
            issue_time.append_value(micros(&row.issue_time));
            lead_time.append_value(row.lead_time());
            member.append_value(row.ensemble_member);
        }

        let mut arrays = columns.finish();
        arrays.push(Arc::new(issue_time.finish()));
        arrays.push(Arc::new(lead_time.finish()));
        arrays.push(Arc::new(member.finish()));

        RecordBatch::try_new(Self::schema(), arrays)
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::fs;

    use arrow::array::{Array, Float64Array, ListArray, StringArray};
    use chrono::{Duration, TimeZone};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::TempDir;

    use crate::{
        db::upsert_in_batches,
        model::{storm_id, Source},
        parquet::ParquetSink,
    };

    use super::*;

    fn forecasts_fixture(n: usize) -> Vec<ForecastTrack> {
        let issue = Utc.with_ymd_and_hms(2023, 8, 28, 0, 0, 0).unwrap();
        let storm = storm_id(Source::Nhc, "AL102023");

        (0..n)
            .map(|i| {
                let valid = issue + Duration::hours(12 * i as i64);
                let mut point = TrackPoint::new(storm, valid, 21.0 + i as f64, -85.0, "OFCL");
                if i == 0 {
                    point.quadrant_radius_34 = Some([Some(10.0), Some(20.0), None, Some(40.0)]);
                }
                ForecastTrack::new(issue, point)
            })
            .collect()
    }

    #[tokio::test]
    async fn should_write_batches_to_one_file() {
        // arrange
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("forecast_tracks").join("AL2023.parquet");
        let mut sink = ParquetSink::<ForecastTrack>::create(&path).unwrap();

        // act
        let summary = upsert_in_batches(&mut sink, forecasts_fixture(5), 2)
            .await
            .unwrap();

        // assert
        assert_eq!(summary.batches, 3);
        let file = fs::File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();

        let mut rows = 0;
        let mut first = None;
        for batch in reader {
            let batch = batch.unwrap();
            assert_eq!(batch.schema().fields().len(), 20);
            assert_eq!(batch.schema().field(18).name(), "issue_time");
            if first.is_none() {
                first = Some(batch.clone());
            }
            rows += batch.num_rows();
        }
        assert_eq!(rows, 5);

        let first = first.unwrap();
        let geometry = first
            .column(5)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(geometry.value(0), "POINT(-85 21)");

        let r34 = first
            .column(12)
            .as_any()
            .downcast_ref::<ListArray>()
            .unwrap();
        assert!(r34.is_null(1));
        let quadrants = r34.value(0);
        let quadrants = quadrants.as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(quadrants.len(), 4);
        assert_eq!(quadrants.value(1), 20.0);
        assert!(quadrants.is_null(2));
    }

    #[test]
    fn should_match_schema_for_ensembles() {
        let forecasts = forecasts_fixture(2);
        let ensembles: Vec<EnsembleTrack> = forecasts
            .into_iter()
            .map(|f| EnsembleTrack::new(f.issue_time, 7, f.point))
            .collect();

        let batch = EnsembleTrack::to_batch(&ensembles).unwrap();

        assert_eq!(batch.num_columns(), 21);
        assert_eq!(batch.schema().field(20).name(), "ensemble_member");
    }
}
