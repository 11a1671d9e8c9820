use crate::error::{ProcessingError, Result};
use crate::models::output::DIM_STATION;
use crate::models::NormalizedOutput;
use crate::utils::filename::station_filename;
use crate::writers::GridWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Splits a grid on the station dimension and writes one Parquet file per
/// station, named after the station's catalog location.
pub struct StationWriter {
    grid: GridWriter,
}

impl StationWriter {
    pub fn new(grid: GridWriter) -> Self {
        Self { grid }
    }

    /// Write every station under `dir`. The outcome of each file is returned
    /// in station order so a failed station does not stop the others.
    pub fn write_stations(
        &self,
        output: &NormalizedOutput,
        dir: &Path,
        name: &str,
    ) -> Result<Vec<(PathBuf, Result<()>)>> {
        let stations = output.dimension(DIM_STATION).map_or(0, |d| d.len());
        let latitudes = location(output, "latitude", stations)?;
        let longitudes = location(output, "longitude", stations)?;

        let mut outcomes = Vec::with_capacity(stations);
        for index in 0..stations {
            let path = station_filename(dir, name, latitudes[index], longitudes[index]);
            let written = output
                .station_slice(index)
                .and_then(|slice| self.grid.write_grid(&slice, &path));
            if let Err(e) = &written {
                warn!(path = %path.display(), error = %e, "station file failed");
            }
            outcomes.push((path, written));
        }

        info!(
            dir = %dir.display(),
            stations,
            "wrote per-station grids"
        );
        Ok(outcomes)
    }
}

fn location<'a>(output: &'a NormalizedOutput, name: &str, stations: usize) -> Result<&'a [f64]> {
    match output.auxiliary(name) {
        Some(aux) if aux.dimension == DIM_STATION && aux.values.len() == stations => {
            Ok(&aux.values)
        }
        _ => Err(ProcessingError::InvalidFormat(format!(
            "Per-station output needs a '{}' coordinate on the station dimension",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::output::DIM_TIME;
    use crate::models::{CoordinateValues, Dimension, VariableMeta};
    use crate::writers::read_grid;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn two_stations() -> NormalizedOutput {
        let t0 = NaiveDate::from_ymd_opt(2018, 7, 9)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut output = NormalizedOutput::new(vec![
            Dimension::new(DIM_TIME, CoordinateValues::Time(vec![t0])),
            Dimension::new(DIM_STATION, CoordinateValues::Integer(vec![0, 1])),
        ]);
        output.push_auxiliary("latitude", DIM_STATION, vec![-33.75, 12.5]);
        output.push_auxiliary("longitude", DIM_STATION, vec![151.25, -70.0]);
        output.push_variable(
            VariableMeta::new("cape", "J kg-1", "CAPE"),
            vec![310.0, f64::NAN],
        );
        output
    }

    #[test]
    fn test_write_stations() -> Result<()> {
        let dir = TempDir::new()?;
        let outcomes =
            StationWriter::new(GridWriter::new()).write_stations(&two_stations(), dir.path(), "cape")?;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            outcomes[0].0,
            dir.path().join("cape_lon151.25_lat-33.75.parquet")
        );
        assert_eq!(outcomes[1].0, dir.path().join("cape_lon-70_lat12.5.parquet"));
        assert!(outcomes.iter().all(|(_, written)| written.is_ok()));

        let first = read_grid(&outcomes[0].0)?;
        assert_eq!(first.variable("cape").unwrap().values, vec![310.0]);
        assert_eq!(first.auxiliary("longitude").unwrap().values, vec![151.25]);
        Ok(())
    }

    #[test]
    fn test_locations_required() {
        let dir = TempDir::new().unwrap();
        let mut output = two_stations();
        output.auxiliary.retain(|a| a.name != "longitude");

        let result = StationWriter::new(GridWriter::new()).write_stations(&output, dir.path(), "cape");
        assert!(matches!(result, Err(ProcessingError::InvalidFormat(_))));
    }
}
