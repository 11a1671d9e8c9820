use clap::Parser;
use era5_station_extract::cli::{run, Cli};
use era5_station_extract::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli).await
}
