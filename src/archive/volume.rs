use crate::error::{ProcessingError, Result};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Coordinate axes of one grid volume. Every axis is strictly monotonic.
#[derive(Debug, Clone, PartialEq)]
pub struct GridAxes {
    pub times: Vec<NaiveDateTime>,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    pub levels: Option<Vec<f64>>,
}

impl GridAxes {
    pub fn new(
        times: Vec<NaiveDateTime>,
        latitudes: Vec<f64>,
        longitudes: Vec<f64>,
        levels: Option<Vec<f64>>,
    ) -> Result<Self> {
        if times.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ProcessingError::InvalidFormat(
                "time axis is not strictly increasing".to_string(),
            ));
        }
        check_monotonic("latitude", &latitudes)?;
        check_monotonic("longitude", &longitudes)?;
        if let Some(levels) = &levels {
            check_monotonic("level", levels)?;
        }

        Ok(Self {
            times,
            latitudes,
            longitudes,
            levels,
        })
    }

    pub fn level_count(&self) -> usize {
        self.levels.as_ref().map_or(1, |l| l.len())
    }

    /// Row-major offset of an index in (time, level, latitude, longitude) order.
    pub fn offset(&self, index: GridIndex) -> usize {
        let level = index.level.unwrap_or(0);
        ((index.time * self.level_count() + level) * self.latitudes.len() + index.latitude)
            * self.longitudes.len()
            + index.longitude
    }

    pub fn cell_count(&self) -> usize {
        self.times.len() * self.level_count() * self.latitudes.len() * self.longitudes.len()
    }
}

fn check_monotonic(name: &str, values: &[f64]) -> Result<()> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ProcessingError::InvalidFormat(format!(
            "{} axis holds non-finite coordinates",
            name
        )));
    }
    let ascending = values.windows(2).all(|w| w[0] < w[1]);
    let descending = values.windows(2).all(|w| w[0] > w[1]);
    if ascending || descending {
        Ok(())
    } else {
        Err(ProcessingError::InvalidFormat(format!(
            "{} axis is not strictly monotonic",
            name
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridIndex {
    pub time: usize,
    pub level: Option<usize>,
    pub latitude: usize,
    pub longitude: usize,
}

/// Read-only view of one archive file.
///
/// Implementations release their underlying handle on drop.
pub trait GridVolume {
    /// Identifier used in log messages and reports, usually the file path.
    fn name(&self) -> &str;

    fn axes(&self) -> &GridAxes;

    fn has_variable(&self, variable: &str) -> bool;

    fn read_point(&self, variable: &str, index: GridIndex) -> Result<f64>;

    /// Values at one grid column for every (time, level) pair, time-major.
    fn read_column(
        &self,
        variable: &str,
        latitude: usize,
        longitude: usize,
        times: &[usize],
        levels: Option<&[usize]>,
    ) -> Result<Vec<f64>> {
        let mut values = Vec::with_capacity(times.len() * levels.map_or(1, |l| l.len()));
        for &time in times {
            match levels {
                Some(levels) => {
                    for &level in levels {
                        values.push(self.read_point(
                            variable,
                            GridIndex {
                                time,
                                level: Some(level),
                                latitude,
                                longitude,
                            },
                        )?);
                    }
                }
                None => values.push(self.read_point(
                    variable,
                    GridIndex {
                        time,
                        level: None,
                        latitude,
                        longitude,
                    },
                )?),
            }
        }
        Ok(values)
    }
}

/// Opens archive files as grid volumes.
pub trait VolumeSource: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn GridVolume>>;
}

/// Fully materialised volume, for small grids and tests.
#[derive(Debug, Clone)]
pub struct MemoryVolume {
    name: String,
    axes: GridAxes,
    variables: HashMap<String, Vec<f64>>,
}

impl MemoryVolume {
    pub fn new(name: &str, axes: GridAxes) -> Self {
        Self {
            name: name.to_string(),
            axes,
            variables: HashMap::new(),
        }
    }

    /// Attach a variable laid out in (time, level, latitude, longitude) order.
    pub fn with_variable(mut self, variable: &str, values: Vec<f64>) -> Result<Self> {
        let expected = self.axes.cell_count();
        if values.len() != expected {
            return Err(ProcessingError::ShapeMismatch {
                variable: variable.to_string(),
                expected,
                actual: values.len(),
            });
        }
        self.variables.insert(variable.to_string(), values);
        Ok(self)
    }

    /// Attach a variable computed from its coordinates.
    pub fn with_variable_fn<F>(self, variable: &str, f: F) -> Result<Self>
    where
        F: Fn(NaiveDateTime, Option<f64>, f64, f64) -> f64,
    {
        let mut values = Vec::with_capacity(self.axes.cell_count());
        let levels: Vec<Option<f64>> = match &self.axes.levels {
            Some(levels) => levels.iter().map(|l| Some(*l)).collect(),
            None => vec![None],
        };
        for &time in &self.axes.times {
            for &level in &levels {
                for &lat in &self.axes.latitudes {
                    for &lon in &self.axes.longitudes {
                        values.push(f(time, level, lat, lon));
                    }
                }
            }
        }
        self.with_variable(variable, values)
    }
}

impl GridVolume for MemoryVolume {
    fn name(&self) -> &str {
        &self.name
    }

    fn axes(&self) -> &GridAxes {
        &self.axes
    }

    fn has_variable(&self, variable: &str) -> bool {
        self.variables.contains_key(variable)
    }

    fn read_point(&self, variable: &str, index: GridIndex) -> Result<f64> {
        let values = self
            .variables
            .get(variable)
            .ok_or_else(|| ProcessingError::VariableMissing {
                variable: variable.to_string(),
                source_name: self.name.clone(),
            })?;
        let offset = self.axes.offset(index);
        values.get(offset).copied().ok_or_else(|| {
            ProcessingError::InvalidFormat(format!(
                "index {:?} outside volume {}",
                index, self.name
            ))
        })
    }
}

/// Serves pre-built memory volumes keyed by archive path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    volumes: HashMap<PathBuf, MemoryVolume>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &Path, volume: MemoryVolume) {
        self.volumes.insert(path.to_path_buf(), volume);
    }
}

impl VolumeSource for MemorySource {
    fn open(&self, path: &Path) -> Result<Box<dyn GridVolume>> {
        self.volumes
            .get(path)
            .cloned()
            .map(|v| Box::new(v) as Box<dyn GridVolume>)
            .ok_or_else(|| ProcessingError::NotFound {
                path: path.to_path_buf(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn hours(n: i64) -> Vec<NaiveDateTime> {
        let t0 = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n).map(|h| t0 + chrono::Duration::hours(h)).collect()
    }

    #[test]
    fn test_axes_reject_non_monotonic() {
        assert!(GridAxes::new(hours(2), vec![1.0, 0.0, 0.5], vec![0.0], None).is_err());
        assert!(GridAxes::new(hours(2), vec![1.0, 0.5, 0.0], vec![0.0, 0.25], None).is_ok());
        let mut times = hours(2);
        times.reverse();
        assert!(GridAxes::new(times, vec![0.0], vec![0.0], None).is_err());
    }

    #[test]
    fn test_memory_volume_layout() {
        let axes = GridAxes::new(
            hours(2),
            vec![1.0, 0.0],
            vec![10.0, 11.0, 12.0],
            Some(vec![500.0, 850.0]),
        )
        .unwrap();
        let volume = MemoryVolume::new("mem", axes)
            .with_variable_fn("t", |time, level, lat, lon| {
                time.hour() as f64 * 1000.0 + level.unwrap_or(0.0) + lat * 10.0 + lon
            })
            .unwrap();

        let index = GridIndex {
            time: 1,
            level: Some(1),
            latitude: 0,
            longitude: 2,
        };
        assert_eq!(volume.read_point("t", index).unwrap(), 1000.0 + 850.0 + 10.0 + 12.0);

        let column = volume.read_column("t", 1, 0, &[0, 1], Some(&[0, 1])).unwrap();
        assert_eq!(column, vec![510.0, 860.0, 1510.0, 1860.0]);

        assert!(matches!(
            volume.read_point("q", index),
            Err(ProcessingError::VariableMissing { .. })
        ));
    }

    #[test]
    fn test_memory_volume_shape_checked() {
        let axes = GridAxes::new(hours(1), vec![0.0], vec![0.0, 1.0], None).unwrap();
        assert!(MemoryVolume::new("mem", axes).with_variable("cape", vec![1.0]).is_err());
    }
}
