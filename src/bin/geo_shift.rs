//! geo_shift - offset the coordinates of a record file

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use overlay_telemetry::shift::shift_file;
use overlay_telemetry::CoordinateShift;

#[path = "../ui.rs"]
#[allow(dead_code)]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Record file to read.
    #[arg(long, default_value = "output/output.csv")]
    input: PathBuf,
    /// Record file to write.
    #[arg(long, default_value = "output/output_censored.csv")]
    output: PathBuf,
    /// Degrees added to every latitude.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    lat_shift: f64,
    /// Degrees added to every longitude.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    lon_shift: f64,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = ui::Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());
    let shift = CoordinateShift {
        latitude: args.lat_shift,
        longitude: args.lon_shift,
    };

    let count = {
        let _stage = ui.stage("Shift coordinates");
        shift_file(&args.input, &args.output, shift)?
    };
    log::info!(
        "shifted {} records by ({}, {})",
        count,
        shift.latitude,
        shift.longitude
    );
    println!("{} records written to {}", count, args.output.display());
    Ok(())
}
