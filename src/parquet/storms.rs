//! Arrow layout of the storms table.

use std::sync::{Arc, OnceLock};

use arrow::{
    array::{ArrayRef, BooleanArray, Int32Array, StringArray},
    datatypes::{DataType, Field, Schema, SchemaRef},
    error::ArrowError,
    record_batch::RecordBatch,
};

use crate::model::Storm;

use super::Columnar;

impl Columnar for Storm {
    fn schema() -> SchemaRef {
        static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
        SCHEMA
            .get_or_init(|| {
                Arc::new(Schema::new(vec![
                    Field::new("storm_id", DataType::Utf8, false),
                    Field::new("sid", DataType::Utf8, false),
                    Field::new("source", DataType::Utf8, false),
                    Field::new("atcf_id", DataType::Utf8, true),
                    Field::new("number", DataType::Int32, true),
                    Field::new("season", DataType::Int32, true),
                    Field::new("name", DataType::Utf8, true),
                    Field::new("genesis_basin", DataType::Utf8, true),
                    Field::new("provisional", DataType::Boolean, false),
                ]))
            })
            .clone()
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|s| s.storm_id.to_string()),
            )),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|s| s.sid.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|s| s.source.as_str()))),
            Arc::new(StringArray::from_iter(rows.iter().map(|s| s.atcf_id.as_deref()))),
            Arc::new(Int32Array::from_iter(rows.iter().map(|s| s.number))),
            Arc::new(Int32Array::from_iter(rows.iter().map(|s| s.season))),
            Arc::new(StringArray::from_iter(rows.iter().map(|s| s.name.as_deref()))),
            Arc::new(StringArray::from_iter(rows.iter().map(|s| s.genesis_basin.as_deref()))),
            Arc::new(BooleanArray::from_iter(rows.iter().map(|s| Some(s.provisional)))),
        ];

        RecordBatch::try_new(Self::schema(), columns)
    }
}

// -- Tests -------------------------------------------------------------------
