//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{config::Mode, db::DEFAULT_CHUNKSIZE};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Loads tropical cyclone tracks into PostGIS
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load an IBTrACS best-track snapshot
    Ibtracs {
        #[command(flatten)]
        common: CommonArgs,

        #[arg(long, value_enum, default_value_t = IbtracsDataset::Last3Years)]
        dataset_type: IbtracsDataset,
    },
    /// Load ECMWF TIGGE cyclone forecasts for a date range
    Ecmwf {
        #[command(flatten)]
        common: CommonArgs,

        /// First day, defaults to yesterday
        #[arg(long)]
        start_date: Option<NaiveDate>,

        /// Last day, defaults to yesterday
        #[arg(long)]
        end_date: Option<NaiveDate>,

        /// Log and skip cycles that are not published
        #[arg(long)]
        skip_missing: bool,
    },
    /// Load NHC advisories; current storms unless a year is given
    Nhc {
        #[command(flatten)]
        common: CommonArgs,

        #[arg(long)]
        start_year: Option<i32>,

        /// Defaults to the start year
        #[arg(long, requires = "start_year")]
        end_year: Option<i32>,
    },
    /// Create the storms schema, tables and indexes
    InitDb {
        #[arg(long, value_enum, default_value_t = Mode::Dev)]
        mode: Mode,
    },
    /// Drop the storms schema and everything in it
    Teardown {
        #[arg(long, value_enum, default_value_t = Mode::Dev)]
        mode: Mode,

        /// Confirm the drop
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, value_enum, default_value_t = Mode::Dev)]
    pub mode: Mode,

    /// Rows per batch and per transaction
    #[arg(long, default_value_t = DEFAULT_CHUNKSIZE, value_parser = parse_chunksize)]
    pub chunksize: usize,

    /// Archive raw downloads to object storage
    #[arg(long)]
    pub save_to_blob: bool,

    /// Working directory, defaults to the OS temp dir
    #[arg(long)]
    pub save_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IbtracsDataset {
    #[value(name = "ALL")]
    All,
    #[value(name = "ACTIVE")]
    Active,
    #[value(name = "last3years")]
    Last3Years,
}

impl IbtracsDataset {
    pub fn as_str(&self) -> &'static str {
        match self {
            IbtracsDataset::All => "ALL",
            IbtracsDataset::Active => "ACTIVE",
            IbtracsDataset::Last3Years => "last3years",
        }
    }
}

fn parse_chunksize(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(format!("`{s}` is not a positive integer")),
    }
}

pub fn yesterday() -> NaiveDate {
    Utc::now().date_naive().pred_opt().unwrap_or_else(|| Utc::now().date_naive())
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    ProgressBar::new(size).with_message(message).with_style(
        ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    )
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn should_have_valid_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn should_default_common_args() {
        let cli = Cli::try_parse_from(["storm-etl", "ibtracs"]).unwrap();

        match cli.command {
            Commands::Ibtracs { common, dataset_type } => {
                assert_eq!(common.mode, Mode::Dev);
                assert_eq!(common.chunksize, 10_000);
                assert!(!common.save_to_blob);
                assert_eq!(dataset_type, IbtracsDataset::Last3Years);
            }
            _ => panic!("expected ibtracs"),
        }
    }

    #[test]
    fn should_reject_zero_chunksize() {
        assert!(Cli::try_parse_from(["storm-etl", "nhc", "--chunksize", "0"]).is_err());
    }

    #[test]
    fn should_parse_ecmwf_range() {
        let cli = Cli::try_parse_from([
            "storm-etl",
            "-v",
            "ecmwf",
            "--mode",
            "local",
            "--start-date",
            "2023-08-01",
            "--end-date",
            "2023-08-03",
            "--skip-missing",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Ecmwf { common, start_date, end_date, skip_missing } => {
                assert_eq!(common.mode, Mode::Local);
                assert_eq!(start_date, NaiveDate::from_ymd_opt(2023, 8, 1));
                assert_eq!(end_date, NaiveDate::from_ymd_opt(2023, 8, 3));
                assert!(skip_missing);
            }
            _ => panic!("expected ecmwf"),
        }
    }

    #[test]
    fn should_require_start_year_for_end_year() {
        assert!(Cli::try_parse_from(["storm-etl", "nhc", "--end-year", "2023"]).is_err());
    }

    #[test]
    fn should_parse_dataset_names() {
        let cli = Cli::try_parse_from(["storm-etl", "ibtracs", "--dataset-type", "ACTIVE"]).unwrap();

        assert!(matches!(
            cli.command,
            Commands::Ibtracs { dataset_type: IbtracsDataset::Active, .. }
        ));
    }
}
