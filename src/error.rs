//! Error types shared by the retrieval, parsing and writing layers.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure to obtain a raw source file.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("no file available at any of: {0}")]
    Missing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to turn raw bytes into an in-memory dataset.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("ATCF line {line}: {reason}")]
    Atcf { line: usize, reason: String },

    #[error("CXML: {0}")]
    Cxml(#[from] quick_xml::de::DeError),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid timestamp `{0}`")]
    Timestamp(String),

    #[error("NetCDF: {0}")]
    NetCdf(String),
}

/// Failure of a single storage backend call.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of an upsert run over a record set.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("could not open sink for {table}: {source}")]
    Open {
        table: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("batch {batch} of {table} failed after {committed} committed rows: {source}")]
    Batch {
        table: &'static str,
        batch: usize,
        committed: usize,
        #[source]
        source: StoreError,
    },

    #[error("could not close sink for {table}: {source}")]
    Close {
        table: &'static str,
        #[source]
        source: StoreError,
    },
}

/// Failure to archive a raw file to object storage.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("upload of {key} failed: {reason}")]
    Upload { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Missing or malformed configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(String),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: String, value: String },
}
