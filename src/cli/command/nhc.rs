use std::{collections::BTreeSet, path::Path};

use anyhow::{bail, Context, Result};
use regex::Regex;
use tracing::{error, info};

use crate::{
    archive::{nhc_archive_prefix, NHC_CURRENT_PREFIX},
    cli::create_spinner,
    download::{download_optional, download_to_dir, fetch_text_optional, gunzip_to_string},
    normalize::nhc,
    reading::{read_adeck, read_current_storms, AtcfLine},
};

use super::Pipeline;

/// Basins covered by the NHC archive.
pub const BASINS: [&str; 3] = ["AL", "EP", "CP"];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub storms: usize,
    pub tracks: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Loads the storms NHC is currently advising on.
pub async fn nhc_current(pipeline: &Pipeline) -> Result<()> {
    let url = &pipeline.endpoints.nhc_current;
    let bar = create_spinner("Downloading NHC current storms".to_string());
    let path = download_to_dir(&pipeline.client, url, pipeline.download_dir(), bar)
        .await
        .context("Could not download NHC current storms")?;
    pipeline.archive(NHC_CURRENT_PREFIX, &path).await?;

    let active = read_current_storms(&std::fs::read_to_string(&path)?)
        .context("Could not parse NHC current storms")?;
    if active.is_empty() {
        info!("No active storms. Skipping.");
        return Ok(());
    }
    info!("{} active storms", active.len());

    let mut lines: Vec<AtcfLine> = Vec::new();
    for storm in &active {
        let url = format!("{}/a{}.dat.gz", pipeline.endpoints.nhc_aid_public, storm.id.to_lowercase());
        match download_adeck(pipeline, &url, NHC_CURRENT_PREFIX).await? {
            Some(adeck) => lines.extend(adeck),
            None => info!("No A-deck for {}. Skipping forecasts.", storm.atcf_id()),
        }
    }

    // the live feed is newer than the A-deck, so its storm rows go last
    let mut storms = nhc::adeck_storms(&lines);
    storms.extend(nhc::current_storms(&active));
    let mut observed = nhc::current_tracks(&active);
    observed.extend(nhc::adeck_observations(&lines));
    let forecasts = nhc::adeck_forecasts(&lines);

    let unit = "nhc_current";
    pipeline.store.upsert(unit, storms, pipeline.chunksize).await?;
    pipeline.store.upsert(unit, observed, pipeline.chunksize).await?;
    pipeline.store.upsert(unit, forecasts, pipeline.chunksize).await?;

    Ok(())
}

/// Loads archived A-decks for every basin of each year. A failing
/// (year, basin) is logged and skipped.
pub async fn nhc_archive(pipeline: &Pipeline, start_year: i32, end_year: i32) -> Result<ArchiveSummary> {
    if start_year > end_year {
        bail!("Start year {} is after end year {}", start_year, end_year);
    }

    let mut summary = ArchiveSummary::default();

    for year in start_year..=end_year {
        info!("Processing NHC archive for {}", year);

        for basin in BASINS {
            match archive_unit(pipeline, year, basin).await {
                Ok(Some((storms, tracks))) => {
                    summary.storms += storms;
                    summary.tracks += tracks;
                }
                Ok(None) => {
                    info!("No storms found for {} {}. Skipping.", year, basin);
                    summary.skipped += 1;
                }
                Err(e) => {
                    error!("Error processing {} {}: {:#}", year, basin, e);
                    summary.failed += 1;
                }
            }
        }
    }

    info!(
        "NHC archive finished: {} storms and {} track points across {} year(s), {} unit(s) skipped, {} failed",
        summary.storms,
        summary.tracks,
        end_year - start_year + 1,
        summary.skipped,
        summary.failed
    );

    Ok(summary)
}

/// A-deck file names for `basin` and `year` in a directory listing.
pub fn list_adecks(listing: &str, basin: &str, year: i32) -> Result<Vec<String>> {
    let pattern = Regex::new(&format!(r"a{}\d{{2}}{}\.dat\.gz", basin.to_lowercase(), year))?;
    let names: BTreeSet<String> = pattern
        .find_iter(listing)
        .map(|m| m.as_str().to_string())
        .collect();

    Ok(names.into_iter().collect())
}

async fn archive_unit(pipeline: &Pipeline, year: i32, basin: &str) -> Result<Option<(usize, usize)>> {
    let directory = format!("{}/{}", pipeline.endpoints.nhc_archive, year);
    let Some(listing) = fetch_text_optional(&pipeline.client, &format!("{directory}/")).await? else {
        return Ok(None);
    };

    let prefix = nhc_archive_prefix(year);
    let mut lines: Vec<AtcfLine> = Vec::new();
    for name in list_adecks(&listing, basin, year)? {
        if let Some(adeck) = download_adeck(pipeline, &format!("{directory}/{name}"), &prefix).await? {
            lines.extend(adeck);
        }
    }
    if lines.is_empty() {
        return Ok(None);
    }

    let unit = format!("nhc_{}_{}", year, basin.to_lowercase());

    let storms = pipeline
        .store
        .upsert(&unit, nhc::adeck_storms(&lines), pipeline.chunksize)
        .await?;
    let observed = pipeline
        .store
        .upsert(&unit, nhc::adeck_observations(&lines), pipeline.chunksize)
        .await?;
    let forecasts = pipeline
        .store
        .upsert(&unit, nhc::adeck_forecasts(&lines), pipeline.chunksize)
        .await?;

    Ok(Some((storms.rows, observed.rows + forecasts.rows)))
}

/// Downloads, archives and parses one A-deck. `None` when it is not published.
async fn download_adeck(pipeline: &Pipeline, url: &str, prefix: &str) -> Result<Option<Vec<AtcfLine>>> {
    let bar = create_spinner(format!("Downloading {}", url.rsplit('/').next().unwrap_or(url)));
    let Some(path) = download_optional(&pipeline.client, url, pipeline.download_dir(), bar).await? else {
        return Ok(None);
    };
    pipeline.archive(prefix, &path).await?;

    let lines = parse_adeck(&path)?;
    std::fs::remove_file(&path)?;

    Ok(Some(lines))
}

fn parse_adeck(path: &Path) -> Result<Vec<AtcfLine>> {
    let text = gunzip_to_string(path)?;
    let lines = read_adeck(&text).with_context(|| format!("Could not parse `{}`", path.display()))?;

    Ok(lines)
}

// -- Tests -------------------------------------------------------------------
