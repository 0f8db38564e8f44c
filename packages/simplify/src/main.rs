#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Simplifies the stripped parcels into the collection the viewer loads.

use std::process::ExitCode;

use clap::Parser;
use parcel_map_simplify::{megabytes, SimplifyError, SimplifyJob, PRECEDING_STEP, RETENTION};

#[derive(Parser)]
#[command(
    name = "parcel_map_simplify",
    about = "Simplify parcels-stripped.geojson into public/parcels-web.geojson"
)]
struct Cli {}

fn main() -> ExitCode {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let Cli {} = Cli::parse();

    match run(&SimplifyJob::default()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ SimplifyError::InputMissing { .. }) => {
            eprintln!("{e}");
            eprintln!("{PRECEDING_STEP}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(job: &SimplifyJob) -> Result<(), SimplifyError> {
    println!("Input: {} MB", megabytes(job.input_size()?));
    println!("Simplifying with {RETENTION} vertex retention...");

    let output_size = job.run()?;

    println!(
        "Output: {} MB \u{2192} {}",
        megabytes(output_size),
        job.output.display()
    );
    Ok(())
}
