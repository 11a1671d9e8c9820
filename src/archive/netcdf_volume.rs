//! NetCDF-backed grid volumes for the ERA5 monthly archive.

use crate::archive::cf::{Packing, TimeUnits};
use crate::archive::volume::{GridAxes, GridIndex, GridVolume, VolumeSource};
use crate::error::{ProcessingError, Result};
use netcdf::AttributeValue;
use std::path::Path;
use tracing::debug;

const TIME_NAMES: [&str; 2] = ["time", "valid_time"];
const LATITUDE_NAMES: [&str; 2] = ["latitude", "lat"];
const LONGITUDE_NAMES: [&str; 2] = ["longitude", "lon"];
const LEVEL_NAMES: [&str; 2] = ["level", "pressure_level"];

/// One open NetCDF file. The handle is closed when the volume is dropped.
pub struct NetcdfVolume {
    name: String,
    file: netcdf::File,
    axes: GridAxes,
}

impl NetcdfVolume {
    pub fn open(path: &Path) -> Result<Self> {
        let file = netcdf::open(path)?;
        let name = path.display().to_string();

        let time_var = find_variable(&file, &TIME_NAMES, &name)?;
        let units = string_attribute(&time_var, "units").ok_or_else(|| {
            ProcessingError::InvalidFormat(format!("time variable in {} has no units", name))
        })?;
        let time_units = TimeUnits::parse(&units)?;
        let times = time_var
            .get_values::<f64, _>(..)?
            .into_iter()
            .map(|raw| time_units.decode(raw))
            .collect::<Result<Vec<_>>>()?;

        let latitudes = find_variable(&file, &LATITUDE_NAMES, &name)?.get_values::<f64, _>(..)?;
        let longitudes =
            find_variable(&file, &LONGITUDE_NAMES, &name)?.get_values::<f64, _>(..)?;
        let levels = match LEVEL_NAMES.iter().find_map(|n| file.variable(n)) {
            Some(level_var) => Some(level_var.get_values::<f64, _>(..)?),
            None => None,
        };

        let axes = GridAxes::new(times, latitudes, longitudes, levels)?;
        debug!(
            file = %name,
            times = axes.times.len(),
            latitudes = axes.latitudes.len(),
            longitudes = axes.longitudes.len(),
            "opened NetCDF volume"
        );

        Ok(Self { name, file, axes })
    }

    fn variable(&self, variable: &str) -> Result<netcdf::Variable<'_>> {
        self.file
            .variable(variable)
            .ok_or_else(|| ProcessingError::VariableMissing {
                variable: variable.to_string(),
                source_name: self.name.clone(),
            })
    }
}

fn find_variable<'f>(
    file: &'f netcdf::File,
    candidates: &[&str],
    name: &str,
) -> Result<netcdf::Variable<'f>> {
    candidates
        .iter()
        .find_map(|c| file.variable(c))
        .ok_or_else(|| {
            ProcessingError::InvalidFormat(format!(
                "{} has none of the coordinate variables {:?}",
                name, candidates
            ))
        })
}

fn string_attribute(var: &netcdf::Variable<'_>, key: &str) -> Option<String> {
    match var.attribute_value(key)? {
        Ok(AttributeValue::Str(s)) => Some(s),
        _ => None,
    }
}

fn numeric_attribute(var: &netcdf::Variable<'_>, key: &str) -> Option<f64> {
    match var.attribute_value(key)? {
        Ok(AttributeValue::Double(v)) => Some(v),
        Ok(AttributeValue::Float(v)) => Some(v as f64),
        Ok(AttributeValue::Short(v)) => Some(v as f64),
        Ok(AttributeValue::Int(v)) => Some(v as f64),
        Ok(AttributeValue::Longlong(v)) => Some(v as f64),
        _ => None,
    }
}

fn packing(var: &netcdf::Variable<'_>) -> Packing {
    Packing {
        scale_factor: numeric_attribute(var, "scale_factor").unwrap_or(1.0),
        add_offset: numeric_attribute(var, "add_offset").unwrap_or(0.0),
        fill_value: numeric_attribute(var, "_FillValue"),
        missing_value: numeric_attribute(var, "missing_value"),
    }
}

impl GridVolume for NetcdfVolume {
    fn name(&self) -> &str {
        &self.name
    }

    fn axes(&self) -> &GridAxes {
        &self.axes
    }

    fn has_variable(&self, variable: &str) -> bool {
        self.file.variable(variable).is_some()
    }

    fn read_point(&self, variable: &str, index: GridIndex) -> Result<f64> {
        let levels = index.level.map(|l| vec![l]);
        let values = self.read_column(
            variable,
            index.latitude,
            index.longitude,
            &[index.time],
            levels.as_deref(),
        )?;
        values.into_iter().next().ok_or_else(|| {
            ProcessingError::InvalidFormat(format!("empty read from {}", self.name))
        })
    }

    /// Reads the covering hyperslab of one grid column, never the full grid.
    fn read_column(
        &self,
        variable: &str,
        latitude: usize,
        longitude: usize,
        times: &[usize],
        levels: Option<&[usize]>,
    ) -> Result<Vec<f64>> {
        let (Some(&t_min), Some(&t_max)) = (times.iter().min(), times.iter().max()) else {
            return Ok(Vec::new());
        };
        let var = self.variable(variable)?;
        let packing = packing(&var);
        let rank = var.dimensions().len();
        let lat = latitude..latitude + 1;
        let lon = longitude..longitude + 1;
        let t_span = t_max - t_min + 1;

        let (raw, level_count) = match (rank, levels) {
            (3, None) => (var.get_values::<f64, _>((t_min..t_max + 1, lat, lon))?, 1),
            (4, Some(_)) => {
                let n_levels = self.axes.level_count();
                (
                    var.get_values::<f64, _>((t_min..t_max + 1, 0..n_levels, lat, lon))?,
                    n_levels,
                )
            }
            (4, None) => {
                return Err(ProcessingError::InvalidFormat(format!(
                    "'{}' in {} has a level dimension but no levels were requested",
                    variable, self.name
                )))
            }
            (rank, _) => {
                return Err(ProcessingError::InvalidFormat(format!(
                    "'{}' in {} has unsupported rank {}",
                    variable, self.name, rank
                )))
            }
        };

        if raw.len() != t_span * level_count {
            return Err(ProcessingError::ShapeMismatch {
                variable: variable.to_string(),
                expected: t_span * level_count,
                actual: raw.len(),
            });
        }

        let mut values = Vec::with_capacity(times.len() * levels.map_or(1, |l| l.len()));
        for &time in times {
            let row = (time - t_min) * level_count;
            match levels {
                Some(levels) => {
                    for &level in levels {
                        values.push(packing.unpack(raw[row + level]));
                    }
                }
                None => values.push(packing.unpack(raw[row])),
            }
        }
        Ok(values)
    }
}

/// Opens archive paths with the NetCDF library.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfSource;

impl VolumeSource for NetcdfSource {
    fn open(&self, path: &Path) -> Result<Box<dyn GridVolume>> {
        Ok(Box::new(NetcdfVolume::open(path)?))
    }
}
