//! Handles serialising record sets to disk in the _parquet_ file format.

pub mod storms;
pub mod tracks;

use std::{fs::File, marker::PhantomData, path::Path};

use arrow::{datatypes::SchemaRef, error::ArrowError, record_batch::RecordBatch};
use parquet::{
    arrow::ArrowWriter,
    basic::{Compression, ZstdLevel},
    file::properties::WriterProperties,
};

use crate::{db::BatchSink, error::StoreError};

/// Records with a fixed Arrow layout.
pub trait Columnar: Sized {
    fn schema() -> SchemaRef;

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError>;
}

/// Appends batches of `R` to one Parquet file.
pub struct ParquetSink<R> {
    writer: ArrowWriter<File>,
    rows: PhantomData<R>,
}

impl<R: Columnar> ParquetSink<R> {
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;

        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::default()))
            .set_dictionary_enabled(true)
            .build();

        let writer = ArrowWriter::try_new(file, R::schema(), Some(props))?;

        Ok(ParquetSink {
            writer,
            rows: PhantomData,
        })
    }
}

impl<R: Columnar> BatchSink<R> for ParquetSink<R> {
    async fn write_batch(&mut self, batch: &[R]) -> Result<(), StoreError> {
        let batch = R::to_batch(batch)?;
        self.writer.write(&batch)?;
        // flush so a later failure leaves this batch in its own row group
        self.writer.flush()?;

        Ok(())
    }

    async fn finish(&mut self) -> Result<(), StoreError> {
        self.writer.finish()?;

        Ok(())
    }
}
