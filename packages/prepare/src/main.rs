#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the parcel map preprocessing tools.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use parcel_map_cli_utils::IndicatifProgress;
use parcel_map_prepare::income::{self, IncomeRequest};
use parcel_map_prepare::{megabytes, strip};

#[derive(Parser)]
#[command(name = "parcel_map_prepare", about = "Parcel map data preprocessing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Strip the raw county parcel export down to the fields the viewer
    /// uses, dropping excluded use codes
    Strip {
        /// Raw county parcel `GeoJSON`
        #[arg(long, default_value = "parcels-raw.geojson")]
        input: PathBuf,
        /// Stripped output, the input to `parcel_map_simplify`
        #[arg(long, default_value = "parcels-stripped.geojson")]
        output: PathBuf,
    },
    /// Build the census income tract overlay from `TIGERweb` and the
    /// Census Data API
    Income {
        /// Two-digit state FIPS code
        #[arg(long, default_value = "53")]
        state: String,
        /// Three-digit county FIPS code
        #[arg(long, default_value = "061")]
        county: String,
        /// ACS 5-year vintage
        #[arg(long, default_value = "2022")]
        year: String,
        /// Output `GeoJSON`
        #[arg(long, default_value = "public/income-tracts.geojson")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = parcel_map_cli_utils::init_logger();
    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Commands::Strip { input, output } => {
            println!("Input file: {} MB", megabytes(std::fs::metadata(&input)?.len()));

            let progress = IndicatifProgress::features_bar(&multi, "Stripping parcels");
            let summary = strip::strip_file(&input, &output, &progress)?;

            println!(
                "\nDone! {} features kept, {} excluded in {:.1}s",
                summary.kept,
                summary.excluded,
                start.elapsed().as_secs_f64()
            );
            println!(
                "Output: {} MB -> {}",
                megabytes(std::fs::metadata(&output)?.len()),
                output.display()
            );
        }
        Commands::Income {
            state,
            county,
            year,
            output,
        } => {
            let request = IncomeRequest {
                state_fips: state,
                county_fips: county,
                acs_year: year,
            };
            let client = income::build_client()?;
            let progress = IndicatifProgress::steps_bar(&multi, "Building income tracts", 3);
            let summary =
                income::build_income_tracts(&client, &request, &output, &progress).await?;

            println!(
                "\nDone! Wrote {} tracts to {}",
                summary.tracts,
                output.display()
            );
            println!(
                "  {} with income data, {} nodata",
                summary.with_income,
                summary.tracts - summary.with_income
            );
            println!(
                "  File size: {} KB",
                std::fs::metadata(&output)?.len() / 1024
            );
        }
    }

    Ok(())
}
