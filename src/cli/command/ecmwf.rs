use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use tracing::info;

use crate::{
    archive::ECMWF_PREFIX,
    cli::create_spinner,
    download::download_optional,
    error::RetrievalError,
    normalize::ecmwf,
    reading::{read_cxml, CxmlFix},
};

use super::Pipeline;

/// Forecast cycles published per day.
const CYCLES: [u32; 2] = [0, 12];
/// Streams tried in order for every cycle.
const STREAMS: [&str; 2] = ["prod", "test"];
/// Longest range processed as a single window.
const MAX_WINDOW_DAYS: i64 = 365;

pub async fn ecmwf(
    pipeline: &Pipeline,
    start_date: NaiveDate,
    end_date: NaiveDate,
    skip_missing: bool,
) -> Result<()> {
    if start_date > end_date {
        bail!("Start date {} is after end date {}", start_date, end_date);
    }

    for (start, end) in year_windows(start_date, end_date) {
        info!("Processing ECMWF forecasts from {} to {}", start, end);
        process_window(pipeline, start, end, skip_missing)
            .await
            .with_context(|| format!("ECMWF window {start} to {end} failed"))?;
    }

    Ok(())
}

/// Splits ranges longer than a year on calendar-year boundaries.
pub fn year_windows(start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
    if (end - start).num_days() + 1 <= MAX_WINDOW_DAYS {
        return vec![(start, end)];
    }

    let mut windows = Vec::new();
    let mut from = start;
    while from <= end {
        let year_end = NaiveDate::from_ymd_opt(from.year(), 12, 31).unwrap_or(end);
        let to = year_end.min(end);
        windows.push((from, to));
        match to.succ_opt() {
            Some(next) => from = next,
            None => break,
        }
    }

    windows
}

async fn process_window(
    pipeline: &Pipeline,
    start: NaiveDate,
    end: NaiveDate,
    skip_missing: bool,
) -> Result<()> {
    let mut fixes: Vec<CxmlFix> = Vec::new();

    for day in start.iter_days().take_while(|d| *d <= end) {
        for cycle in CYCLES {
            let Some(path) = download_cycle(pipeline, day, cycle, skip_missing).await? else {
                continue;
            };
            pipeline.archive(ECMWF_PREFIX, &path).await?;

            let xml = std::fs::read_to_string(&path)?;
            let cycle_fixes = read_cxml(&xml)
                .with_context(|| format!("Could not parse `{}`", path.display()))?;
            fixes.extend(cycle_fixes);
            std::fs::remove_file(&path)?;
        }
    }

    if fixes.is_empty() {
        info!("No ECMWF fixes between {} and {}. Skipping.", start, end);
        return Ok(());
    }

    let unit = format!("ecmwf_{}_{}", start.format("%Y%m%d"), end.format("%Y%m%d"));

    let storms = ecmwf::storms(&fixes);
    pipeline.store.upsert(&unit, storms, pipeline.chunksize).await?;

    let forecasts = ecmwf::forecast_tracks(&fixes);
    pipeline.store.upsert(&unit, forecasts, pipeline.chunksize).await?;

    let ensembles = ecmwf::ensemble_tracks(&fixes);
    pipeline.store.upsert(&unit, ensembles, pipeline.chunksize).await?;

    Ok(())
}

pub fn cycle_file_name(day: NaiveDate, cycle: u32, stream: &str) -> String {
    format!(
        "z_tigge_c_ecmf_{}{:02}0000_ifs_glob_{}_all_glo.xml",
        day.format("%Y%m%d"),
        cycle,
        stream
    )
}

/// Downloads one cycle, trying each stream in turn.
async fn download_cycle(
    pipeline: &Pipeline,
    day: NaiveDate,
    cycle: u32,
    skip_missing: bool,
) -> Result<Option<PathBuf>> {
    let mut tried = Vec::new();

    for stream in STREAMS {
        let url = format!(
            "{}/{}/{}/{}",
            pipeline.endpoints.ecmwf,
            day.format("%Y"),
            day.format("%Y%m%d"),
            cycle_file_name(day, cycle, stream)
        );
        let bar = create_spinner(format!("Downloading ECMWF {} {:02}z ({})", day, cycle, stream));

        if let Some(path) = download_optional(&pipeline.client, &url, pipeline.download_dir(), bar).await? {
            return Ok(Some(path));
        }
        tried.push(url);
    }

    if skip_missing {
        info!("No ECMWF file for {} {:02}z. Skipping.", day, cycle);
        return Ok(None);
    }

    Err(RetrievalError::Missing(tried.join(", ")).into())
}

// -- Tests -------------------------------------------------------------------
