mod archive;
mod cli;
mod config;
mod db;
mod download;
mod error;
mod logging;
mod model;
mod normalize;
mod parquet;
mod reading;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::{command, command::Pipeline, yesterday, Cli, Commands};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli.command).await {
        Ok(()) => {
            info!("Pipeline finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Ibtracs { common, dataset_type } => {
            let pipeline = Pipeline::from_args(&common).await?;
            command::ibtracs(&pipeline, dataset_type).await
        }
        Commands::Ecmwf {
            common,
            start_date,
            end_date,
            skip_missing,
        } => {
            let pipeline = Pipeline::from_args(&common).await?;
            let start = start_date.unwrap_or_else(yesterday);
            let end = end_date.unwrap_or_else(yesterday);
            command::ecmwf(&pipeline, start, end, skip_missing).await
        }
        Commands::Nhc {
            common,
            start_year,
            end_year,
        } => {
            let pipeline = Pipeline::from_args(&common).await?;
            match start_year {
                Some(start) => {
                    command::nhc_archive(&pipeline, start, end_year.unwrap_or(start)).await?;
                    Ok(())
                }
                None => command::nhc_current(&pipeline).await,
            }
        }
        Commands::InitDb { mode } => command::init_db(mode).await,
        Commands::Teardown { mode, yes } => command::teardown(mode, yes).await,
    }
}
