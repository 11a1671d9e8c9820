use crate::error::{ProcessingError, Result};
use crate::models::output::{DIM_LEVEL, DIM_STATION, DIM_TIME};
use crate::models::{
    CoordinateValues, Dimension, NormalizedOutput, StationCatalog, StationId, VariableMeta,
};
use crate::processors::SeriesAccumulator;
use chrono::NaiveDateTime;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// A reassembled container and how many repeated observations were folded.
#[derive(Debug, Clone)]
pub struct Reassembly {
    pub output: NormalizedOutput,
    pub duplicates_resolved: usize,
}

/// Builds dense gridded output from accumulated station series.
pub struct Reassembler;

impl Reassembler {
    pub fn new() -> Self {
        Self
    }

    /// Scatter every slice of the named variables into a NaN-filled
    /// (time, station[, level]) container.
    ///
    /// Stations come from the catalog, so a station with no data at all
    /// still gets an all-missing column.
    pub fn reassemble(
        &self,
        accumulator: &SeriesAccumulator,
        catalog: &StationCatalog,
        variables: &[VariableMeta],
    ) -> Result<Reassembly> {
        let stations = catalog.locations();
        let station_pos: HashMap<StationId, usize> = stations
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, i))
            .collect();
        let wanted = |name: &str| variables.iter().any(|m| m.name == name);

        let mut times = BTreeSet::new();
        let mut levels = BTreeSet::new();
        for slices in accumulator.all().values() {
            for slice in slices.iter().filter(|s| wanted(&s.variable)) {
                for sample in &slice.samples {
                    times.insert(sample.time);
                    if let Some(level) = sample.level {
                        levels.insert(level);
                    }
                }
            }
        }
        let times: Vec<NaiveDateTime> = times.into_iter().collect();
        let levels: Vec<i32> = levels.into_iter().collect();
        let time_pos: HashMap<NaiveDateTime, usize> =
            times.iter().enumerate().map(|(i, t)| (*t, i)).collect();
        let level_pos: HashMap<i32, usize> =
            levels.iter().enumerate().map(|(i, l)| (*l, i)).collect();

        let n_stations = stations.len();
        let n_levels = levels.len().max(1);
        let has_levels = !levels.is_empty();

        let mut dimensions = vec![
            Dimension::new(DIM_TIME, CoordinateValues::Time(times.clone())),
            Dimension::new(
                DIM_STATION,
                CoordinateValues::Integer(stations.iter().map(|s| s.id.0 as i64).collect()),
            ),
        ];
        if has_levels {
            dimensions.push(Dimension::new(
                DIM_LEVEL,
                CoordinateValues::Integer(levels.iter().map(|l| *l as i64).collect()),
            ));
        }
        let mut output = NormalizedOutput::new(dimensions);

        let mut grid_latitude = vec![f64::NAN; n_stations];
        let mut grid_longitude = vec![f64::NAN; n_stations];
        let mut duplicates_resolved = 0;

        for meta in variables {
            let cells = times.len() * n_stations * n_levels;
            let mut values = vec![f64::NAN; cells];
            let mut filled = vec![false; cells];

            for (station, slices) in accumulator.all() {
                let Some(&s) = station_pos.get(station) else {
                    return Err(ProcessingError::InvalidFormat(format!(
                        "Station {} is not in the catalog",
                        station
                    )));
                };

                for slice in slices.iter().filter(|sl| sl.variable == meta.name) {
                    if grid_latitude[s].is_nan() {
                        grid_latitude[s] = slice.grid_latitude;
                        grid_longitude[s] = slice.grid_longitude;
                    }

                    for sample in &slice.samples {
                        let t = time_pos[&sample.time];
                        let l = match (sample.level, has_levels) {
                            (Some(level), true) => level_pos[&level],
                            (None, false) => 0,
                            _ => {
                                return Err(ProcessingError::InvalidFormat(format!(
                                    "Variable '{}' mixes levelled and surface samples",
                                    meta.name
                                )))
                            }
                        };
                        let offset = (t * n_stations + s) * n_levels + l;

                        if filled[offset] {
                            let first = values[offset];
                            if same_value(first, sample.value) {
                                duplicates_resolved += 1;
                                continue;
                            }
                            return Err(ProcessingError::DuplicateObservation {
                                station: station.0,
                                time: sample.time,
                                level: sample.level,
                                first,
                                second: sample.value,
                            });
                        }
                        values[offset] = sample.value;
                        filled[offset] = true;
                    }
                }
            }

            output.push_variable(meta.clone(), values);
        }

        output.push_auxiliary(
            "latitude",
            DIM_STATION,
            stations.iter().map(|s| s.latitude).collect(),
        );
        output.push_auxiliary(
            "longitude",
            DIM_STATION,
            stations.iter().map(|s| s.longitude).collect(),
        );
        output.push_auxiliary("grid_latitude", DIM_STATION, grid_latitude);
        output.push_auxiliary("grid_longitude", DIM_STATION, grid_longitude);

        output.validate()?;
        debug!(
            times = times.len(),
            stations = n_stations,
            levels = levels.len(),
            duplicates_resolved,
            "reassembled output"
        );

        Ok(Reassembly {
            output,
            duplicates_resolved,
        })
    }

    /// [`Reassembler::reassemble`] followed by a mean over time.
    pub fn reassemble_time_mean(
        &self,
        accumulator: &SeriesAccumulator,
        catalog: &StationCatalog,
        variables: &[VariableMeta],
    ) -> Result<Reassembly> {
        let reassembly = self.reassemble(accumulator, catalog, variables)?;
        Ok(Reassembly {
            output: time_mean(&reassembly.output)?,
            duplicates_resolved: reassembly.duplicates_resolved,
        })
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

fn same_value(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// Average every time-leading variable over the time dimension.
///
/// Missing cells are skipped; a cell missing at every time stays NaN.
pub fn time_mean(output: &NormalizedOutput) -> Result<NormalizedOutput> {
    let n_times = output
        .dimension(DIM_TIME)
        .map(|d| d.len())
        .ok_or_else(|| {
            ProcessingError::InvalidFormat("Cannot average without a time dimension".to_string())
        })?;

    let dimensions: Vec<Dimension> = output
        .dimensions
        .iter()
        .filter(|d| d.name != DIM_TIME)
        .cloned()
        .collect();
    let mut reduced = NormalizedOutput::new(dimensions);
    reduced.auxiliary = output.auxiliary.clone();
    reduced.attributes = output.attributes.clone();
    reduced.set_attribute("cell_methods", "time: mean");

    if let Some(CoordinateValues::Time(times)) =
        output.dimension(DIM_TIME).map(|d| &d.coordinates)
    {
        if let (Some(first), Some(last)) = (times.first(), times.last()) {
            reduced.set_attribute("time_start", &first.to_string());
            reduced.set_attribute("time_end", &last.to_string());
        }
    }

    for variable in &output.variables {
        if variable.dims.first().map(String::as_str) != Some(DIM_TIME) {
            return Err(ProcessingError::InvalidFormat(format!(
                "Variable '{}' does not lead with the time dimension",
                variable.meta.name
            )));
        }

        let inner = if n_times == 0 {
            reduced.cell_count()
        } else {
            variable.values.len() / n_times
        };
        let mut sums = vec![0.0; inner];
        let mut counts = vec![0usize; inner];
        for (i, value) in variable.values.iter().enumerate() {
            if !value.is_nan() {
                sums[i % inner] += value;
                counts[i % inner] += 1;
            }
        }

        let means = sums
            .into_iter()
            .zip(counts)
            .map(|(sum, count)| {
                if count == 0 {
                    f64::NAN
                } else {
                    sum / count as f64
                }
            })
            .collect();
        reduced.push_variable(variable.meta.clone(), means);
    }

    reduced.validate()?;
    Ok(reduced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractedSlice;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn t(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 2, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn catalog() -> StationCatalog {
        StationCatalog::from_rows(vec![(-6.25, 106.75, None), (1.25, 103.75, None)]).unwrap()
    }

    fn cape() -> VariableMeta {
        VariableMeta::new("cape", "J kg-1", "CAPE")
    }

    fn surface_slice(station: u32, samples: &[(u32, f64)]) -> ExtractedSlice {
        let mut slice = ExtractedSlice::new(StationId(station), "cape", -6.25, 106.75);
        for &(day, value) in samples {
            slice.push(t(day), None, value);
        }
        slice
    }

    #[test]
    fn test_reassemble_fills_missing_with_nan() {
        let mut acc = SeriesAccumulator::new();
        acc.append(StationId(0), surface_slice(0, &[(2, 20.0), (1, 10.0)]));
        acc.append(StationId(1), surface_slice(1, &[(2, 30.0)]));

        let result = Reassembler::new()
            .reassemble(&acc, &catalog(), &[cape()])
            .unwrap();
        let output = result.output;

        assert_eq!(output.dimension_names(), vec!["time", "station"]);
        assert_eq!(
            output.dimension(DIM_TIME).unwrap().coordinates,
            CoordinateValues::Time(vec![t(1), t(2)])
        );
        let values = &output.variable("cape").unwrap().values;
        assert_eq!(values[0], 10.0);
        assert!(values[1].is_nan());
        assert_eq!(values[2], 20.0);
        assert_eq!(values[3], 30.0);
        assert_eq!(output.auxiliary("latitude").unwrap().values, vec![-6.25, 1.25]);
        assert_eq!(result.duplicates_resolved, 0);
    }

    #[test]
    fn test_equal_duplicates_keep_one() {
        let mut acc = SeriesAccumulator::new();
        acc.append(StationId(0), surface_slice(0, &[(1, 10.0)]));
        acc.append(StationId(0), surface_slice(0, &[(1, 10.0)]));

        let result = Reassembler::new()
            .reassemble(&acc, &catalog(), &[cape()])
            .unwrap();
        assert_eq!(result.duplicates_resolved, 1);
        assert_eq!(result.output.variable("cape").unwrap().values[0], 10.0);
    }

    #[test]
    fn test_conflicting_duplicates_fail() {
        let mut acc = SeriesAccumulator::new();
        acc.append(StationId(0), surface_slice(0, &[(1, 10.0)]));
        acc.append(StationId(0), surface_slice(0, &[(1, 11.0)]));

        match Reassembler::new().reassemble(&acc, &catalog(), &[cape()]) {
            Err(ProcessingError::DuplicateObservation {
                station,
                time,
                first,
                second,
                ..
            }) => {
                assert_eq!(station, 0);
                assert_eq!(time, t(1));
                assert_eq!(first, 10.0);
                assert_eq!(second, 11.0);
            }
            other => panic!("expected DuplicateObservation, got {:?}", other),
        }
    }

    #[test]
    fn test_levels_become_a_dimension() {
        let mut acc = SeriesAccumulator::new();
        let mut slice = ExtractedSlice::new(StationId(1), "t", 1.25, 103.75);
        slice.push(t(1), Some(850), 290.0);
        slice.push(t(1), Some(500), 265.0);
        acc.append(StationId(1), slice);

        let meta = VariableMeta::new("t", "K", "Temperature");
        let output = Reassembler::new()
            .reassemble(&acc, &catalog(), &[meta])
            .unwrap()
            .output;

        assert_eq!(output.dimension_names(), vec!["time", "station", "level"]);
        assert_eq!(
            output.dimension(DIM_LEVEL).unwrap().coordinates,
            CoordinateValues::Integer(vec![500, 850])
        );
        let values = &output.variable("t").unwrap().values;
        assert!(values[0].is_nan() && values[1].is_nan());
        assert_eq!(values[2..].to_vec(), vec![265.0, 290.0]);
        assert!(output.auxiliary("grid_latitude").unwrap().values[0].is_nan());
        assert_eq!(output.auxiliary("grid_latitude").unwrap().values[1], 1.25);
    }

    #[test]
    fn test_time_mean_skips_missing() {
        let mut acc = SeriesAccumulator::new();
        acc.append(
            StationId(0),
            surface_slice(0, &[(1, 10.0), (2, f64::NAN), (3, 20.0)]),
        );

        let result = Reassembler::new()
            .reassemble_time_mean(&acc, &catalog(), &[cape()])
            .unwrap();
        let output = result.output;

        assert_eq!(output.dimension_names(), vec!["station"]);
        let values = &output.variable("cape").unwrap().values;
        assert_eq!(values[0], 15.0);
        assert!(values[1].is_nan());
        assert_eq!(
            output.attributes.get("cell_methods").map(String::as_str),
            Some("time: mean")
        );
    }

    #[test]
    fn test_empty_accumulator() {
        let result = Reassembler::new()
            .reassemble(&SeriesAccumulator::new(), &catalog(), &[cape()])
            .unwrap();
        assert_eq!(result.output.cell_count(), 0);
        assert!(result.output.variable("cape").unwrap().values.is_empty());

        let mean = time_mean(&result.output).unwrap();
        assert_eq!(mean.variable("cape").unwrap().values.len(), 2);
    }
}
