use anyhow::{Context, Result};
use tracing::info;

use crate::{
    archive::IBTRACS_PREFIX,
    cli::{create_spinner, IbtracsDataset},
    download::download_to_dir,
    normalize::ibtracs,
    reading::ibtracs::load_ibtracs,
};

use super::Pipeline;

pub fn snapshot_file_name(dataset: IbtracsDataset) -> String {
    format!("IBTrACS.{}.v04r01.nc", dataset.as_str())
}

pub async fn ibtracs(pipeline: &Pipeline, dataset: IbtracsDataset) -> Result<()> {
    let url = format!("{}/{}", pipeline.endpoints.ibtracs, snapshot_file_name(dataset));

    let bar = create_spinner(format!("Downloading IBTrACS {}", dataset.as_str()));
    let path = download_to_dir(&pipeline.client, &url, pipeline.download_dir(), bar)
        .await
        .with_context(|| format!("Could not download IBTrACS {}", dataset.as_str()))?;
    pipeline.archive(IBTRACS_PREFIX, &path).await?;

    let bar = create_spinner("Loading IBTrACS NetCDF".to_string());
    let loaded = load_ibtracs(&path).with_context(|| format!("Could not load `{}`", path.display()));
    bar.finish_and_clear();
    let dataset_rows = loaded?;
    info!(
        "Loaded {} storms and {} observations",
        dataset_rows.storms.len(),
        dataset_rows.observations.len()
    );

    let unit = format!("ibtracs_{}", dataset.as_str());

    let storms = ibtracs::storms(&dataset_rows);
    pipeline.store.upsert(&unit, storms, pipeline.chunksize).await?;

    let tracks = ibtracs::tracks(&dataset_rows);
    pipeline.store.upsert(&unit, tracks, pipeline.chunksize).await?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use crate::cli::command::fixtures::pipeline;

    use super::*;

    #[test]
    fn should_name_snapshot_files() {
        assert_eq!(snapshot_file_name(IbtracsDataset::Active), "IBTrACS.ACTIVE.v04r01.nc");
        assert_eq!(
            snapshot_file_name(IbtracsDataset::Last3Years),
            "IBTrACS.last3years.v04r01.nc"
        );
    }

    #[tokio::test]
    async fn should_abort_when_snapshot_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ibtracs/IBTrACS.ALL.v04r01.nc"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let out = TempDir::new().unwrap();
        let pipeline = pipeline(&server.uri(), out.path());

        let result = ibtracs(&pipeline, IbtracsDataset::All).await;

        assert!(result.is_err());
        assert!(!out.path().join("storms").exists());
    }
}
