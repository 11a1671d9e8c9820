use std::path::{Path, PathBuf};

/// Selection mode token used in output names.
pub fn mode_token(extreme_days: bool) -> &'static str {
    if extreme_days {
        "extreme_days"
    } else {
        "all_days"
    }
}

/// Default grid output: `{output_dir}/{name}_{mode}.parquet`
pub fn default_grid_filename(output_dir: &Path, name: &str, extreme_days: bool) -> PathBuf {
    output_dir.join(format!("{}_{}.parquet", name, mode_token(extreme_days)))
}

/// Table export next to a grid output, same stem with `.csv`.
pub fn table_filename(grid_path: &Path) -> PathBuf {
    grid_path.with_extension("csv")
}

/// Run report next to a grid output: `{stem}.report.json`.
pub fn report_filename(grid_path: &Path) -> PathBuf {
    let stem = grid_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "run".to_string());
    grid_path.with_file_name(format!("{}.report.json", stem))
}

/// Per-station grid file: `{dir}/{name}_lon{lon}_lat{lat}.parquet`.
pub fn station_filename(dir: &Path, name: &str, latitude: f64, longitude: f64) -> PathBuf {
    dir.join(format!("{}_lon{}_lat{}.parquet", name, longitude, latitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grid_filename() {
        let path = default_grid_filename(Path::new("output"), "cape", false);
        assert_eq!(path, PathBuf::from("output/cape_all_days.parquet"));

        let path = default_grid_filename(Path::new("output"), "kindex", true);
        assert_eq!(path, PathBuf::from("output/kindex_extreme_days.parquet"));
    }

    #[test]
    fn test_sibling_filenames() {
        let grid = PathBuf::from("output/wind_extreme_days.parquet");
        assert_eq!(
            table_filename(&grid),
            PathBuf::from("output/wind_extreme_days.csv")
        );
        assert_eq!(
            report_filename(&grid),
            PathBuf::from("output/wind_extreme_days.report.json")
        );
    }

    #[test]
    fn test_station_filename() {
        assert_eq!(
            station_filename(Path::new("output/stations"), "wind", -33.75, 151.25),
            PathBuf::from("output/stations/wind_lon151.25_lat-33.75.parquet")
        );
    }
}
