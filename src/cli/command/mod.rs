pub mod ecmwf;
pub mod ibtracs;
pub mod nhc;
pub mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use reqwest::Client;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::{
    archive::Archive,
    config::{self, Endpoints, Mode, Settings},
    db::{postgres, Store},
    error::ConfigError,
};

use super::CommonArgs;

pub use ecmwf::ecmwf;
pub use ibtracs::ibtracs;
pub use nhc::{nhc_archive, nhc_current};
pub use schema::{init_db, teardown};

/// Everything a pipeline run needs, built once per invocation.
pub struct Pipeline {
    pub client: Client,
    pub endpoints: Endpoints,
    pub store: Store,
    pub archive: Option<Archive>,
    pub chunksize: usize,
    downloads: TempDir,
}

impl Pipeline {
    pub fn new(
        client: Client,
        endpoints: Endpoints,
        store: Store,
        archive: Option<Archive>,
        chunksize: usize,
        save_dir: &Path,
    ) -> Result<Self> {
        std::fs::create_dir_all(save_dir)
            .with_context(|| format!("Could not create `{}`", save_dir.display()))?;
        let downloads = tempfile::Builder::new()
            .prefix("storm-etl-")
            .tempdir_in(save_dir)?;

        Ok(Pipeline {
            client,
            endpoints,
            store,
            archive,
            chunksize,
            downloads,
        })
    }

    /// Connects the store and archive selected by the command line flags.
    pub async fn from_args(common: &CommonArgs) -> Result<Self> {
        let settings = Settings::from_env(common.mode)?;
        let save_dir = config::save_dir(common.save_dir.clone());

        let store = match &settings.database_url {
            Some(url) => Store::Postgres(postgres::connect(url).await?),
            None => {
                let dir = save_dir.join("storms");
                info!("Local mode: writing Parquet files under `{}`", dir.display());
                Store::Parquet(dir)
            }
        };

        let archive = if !common.save_to_blob {
            None
        } else if common.mode == Mode::Local {
            Some(Archive::local(&save_dir))
        } else {
            let storage = settings
                .storage
                .as_ref()
                .ok_or_else(|| ConfigError::Missing(bucket_variable(common.mode)))?;
            Some(Archive::s3(storage))
        };

        Pipeline::new(
            Client::new(),
            Endpoints::default(),
            store,
            archive,
            common.chunksize,
            &save_dir,
        )
    }

    /// Scratch directory for this run's downloads, removed on drop.
    pub fn download_dir(&self) -> &Path {
        self.downloads.path()
    }

    /// Archives a raw file when archival is enabled.
    pub async fn archive(&self, prefix: &str, file: &Path) -> Result<()> {
        if let Some(archive) = &self.archive {
            let key = archive
                .store(prefix, file)
                .await
                .with_context(|| format!("Could not archive `{}`", file.display()))?;
            debug!("Archived raw file as `{}`", key);
        }

        Ok(())
    }
}

fn bucket_variable(mode: Mode) -> String {
    match mode {
        Mode::Prod => "STORMS_ARCHIVE_BUCKET_PROD".to_string(),
        _ => "STORMS_ARCHIVE_BUCKET_DEV".to_string(),
    }
}
