//! Archival of raw source files, to an S3 bucket or a local directory.

use std::path::{Path, PathBuf};

use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use tracing::{debug, info};

use crate::{config::StorageConfig, error::ArchiveError};

pub const IBTRACS_PREFIX: &str = "ibtracs/v04r01";
pub const ECMWF_PREFIX: &str = "ecmwf/xml";
pub const NHC_CURRENT_PREFIX: &str = "nhc/current";

pub fn nhc_archive_prefix(year: i32) -> String {
    format!("nhc/archive/{year}")
}

/// Object key for `file` under `prefix`.
pub fn object_key(prefix: &str, file: &Path) -> String {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    format!("{}/{}", prefix.trim_end_matches('/'), name)
}

pub enum Archive {
    S3 { client: Client, bucket: String },
    Local(PathBuf),
}

impl Archive {
    pub fn s3(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "storm-etl",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!("Archiving raw files to bucket `{}`", config.bucket);

        Archive::S3 {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }

    /// Local mode: `<save_dir>/archive/<key>`.
    pub fn local(save_dir: &Path) -> Self {
        Archive::Local(save_dir.join("archive"))
    }

    /// Copies `file` to `<prefix>/<file name>` and returns the key.
    pub async fn store(&self, prefix: &str, file: &Path) -> Result<String, ArchiveError> {
        let key = object_key(prefix, file);

        match self {
            Archive::S3 { client, bucket } => {
                let body = ByteStream::from_path(file)
                    .await
                    .map_err(|e| ArchiveError::Upload {
                        key: key.clone(),
                        reason: e.to_string(),
                    })?;

                client
                    .put_object()
                    .bucket(bucket)
                    .key(&key)
                    .body(body)
                    .send()
                    .await
                    .map_err(|e| ArchiveError::Upload {
                        key: key.clone(),
                        reason: e.to_string(),
                    })?;

                debug!("Uploaded s3://{}/{}", bucket, key);
            }
            Archive::Local(dir) => {
                let target = dir.join(&key);
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(file, &target)?;

                debug!("Archived to `{}`", target.display());
            }
        }

        Ok(key)
    }
}

// -- Tests -------------------------------------------------------------------
