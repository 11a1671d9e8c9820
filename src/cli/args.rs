use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "era5-station-extract")]
#[command(about = "Nearest-neighbour ERA5 extraction for station lists and extreme-event dates")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Settings file (TOML)")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract a variable or recipe for every station in a catalog
    Extract {
        #[arg(help = "cape, cin, tcwv, t, r, u, v, kindex or wind")]
        variable: String,

        #[arg(
            short,
            long,
            help = "Station CSV with latitude, longitude and (for --extreme-days) date columns"
        )]
        stations: PathBuf,

        #[arg(
            short,
            long,
            help = "Output Parquet file path [default: {output_dir}/{variable}_{all_days|extreme_days}.parquet]"
        )]
        output_file: Option<PathBuf>,

        #[arg(long, help = "Require a date column and extract event days only")]
        extreme_days: bool,

        #[arg(long, value_delimiter = ',', help = "Pressure levels in hPa, e.g. 500,700,850")]
        levels: Option<Vec<i32>>,

        #[arg(long, help = "Average over time into per-station (profile) means")]
        time_mean: bool,

        #[arg(long)]
        start_year: Option<i32>,

        #[arg(long)]
        end_year: Option<i32>,

        #[arg(long, help = "Single-level archive root")]
        single_level_root: Option<PathBuf>,

        #[arg(long, help = "Pressure-level archive root")]
        pressure_level_root: Option<PathBuf>,

        #[arg(short, long)]
        compression: Option<String>,

        #[arg(long)]
        max_workers: Option<usize>,

        #[arg(long, help = "Also write a CSV table next to the Parquet file")]
        table: bool,

        #[arg(long, help = "Also write one Parquet file per station under <output dir>/stations")]
        per_station: bool,

        #[arg(long, help = "Plan the run and list missing files without extracting")]
        dry_run: bool,
    },

    /// Show where the archive files for a variable are expected and which exist
    Locate {
        variable: String,

        #[arg(long)]
        start_year: Option<i32>,

        #[arg(long)]
        end_year: Option<i32>,

        #[arg(long, help = "Only list missing files")]
        missing_only: bool,
    },

    /// Display information about a grid Parquet file
    Info {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long, default_value = "10", help = "Rows of the table to print")]
        sample: usize,
    },
}
