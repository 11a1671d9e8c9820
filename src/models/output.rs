use crate::error::{ProcessingError, Result};
use crate::models::VariableMeta;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DIM_TIME: &str = "time";
pub const DIM_STATION: &str = "station";
pub const DIM_LEVEL: &str = "level";

/// Values of a dimension coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum CoordinateValues {
    Time(Vec<NaiveDateTime>),
    Integer(Vec<i64>),
    Float(Vec<f64>),
}

impl CoordinateValues {
    pub fn len(&self) -> usize {
        match self {
            CoordinateValues::Time(v) => v.len(),
            CoordinateValues::Integer(v) => v.len(),
            CoordinateValues::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text form of one coordinate, used by the table export.
    pub fn format_at(&self, index: usize) -> String {
        match self {
            CoordinateValues::Time(v) => v[index].format("%Y-%m-%d %H:%M:%S").to_string(),
            CoordinateValues::Integer(v) => v[index].to_string(),
            CoordinateValues::Float(v) => v[index].to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub coordinates: CoordinateValues,
}

impl Dimension {
    pub fn new(name: &str, coordinates: CoordinateValues) -> Self {
        Self {
            name: name.to_string(),
            coordinates,
        }
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

/// A non-dimension coordinate laid along one dimension, e.g. the latitude of
/// each station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryCoordinate {
    pub name: String,
    pub dimension: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataVariable {
    pub meta: VariableMeta,
    pub dims: Vec<String>,
    /// Row-major over `dims`, NaN marks a missing cell.
    pub values: Vec<f64>,
}

/// Dense, densely indexed result of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedOutput {
    pub dimensions: Vec<Dimension>,
    pub auxiliary: Vec<AuxiliaryCoordinate>,
    pub variables: Vec<DataVariable>,
    pub attributes: BTreeMap<String, String>,
}

impl NormalizedOutput {
    pub fn new(dimensions: Vec<Dimension>) -> Self {
        Self {
            dimensions,
            ..Default::default()
        }
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&DataVariable> {
        self.variables.iter().find(|v| v.meta.name == name)
    }

    pub fn auxiliary(&self, name: &str) -> Option<&AuxiliaryCoordinate> {
        self.auxiliary.iter().find(|a| a.name == name)
    }

    pub fn dimension_names(&self) -> Vec<String> {
        self.dimensions.iter().map(|d| d.name.clone()).collect()
    }

    /// Number of cells spanned by every dimension.
    pub fn cell_count(&self) -> usize {
        self.dimensions.iter().map(|d| d.len()).product()
    }

    /// Add a variable laid out over all dimensions in declaration order.
    pub fn push_variable(&mut self, meta: VariableMeta, values: Vec<f64>) {
        let dims = self.dimension_names();
        self.variables.push(DataVariable { meta, dims, values });
    }

    pub fn push_auxiliary(&mut self, name: &str, dimension: &str, values: Vec<f64>) {
        self.auxiliary.push(AuxiliaryCoordinate {
            name: name.to_string(),
            dimension: dimension.to_string(),
            values,
        });
    }

    pub fn set_attribute(&mut self, key: &str, value: &str) {
        self.attributes.insert(key.to_string(), value.to_string());
    }

    /// Check the shape and coordinate invariants. Nothing is reshaped.
    pub fn validate(&self) -> Result<()> {
        for (i, dim) in self.dimensions.iter().enumerate() {
            if self.dimensions[..i].iter().any(|d| d.name == dim.name) {
                return Err(ProcessingError::InvalidFormat(format!(
                    "Dimension '{}' declared twice",
                    dim.name
                )));
            }
        }

        if let Some(time) = self.dimension(DIM_TIME) {
            if let CoordinateValues::Time(times) = &time.coordinates {
                if times.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(ProcessingError::InvalidFormat(
                        "Time coordinate must be unique and sorted ascending".to_string(),
                    ));
                }
            }
        }

        for aux in &self.auxiliary {
            let dim = self.dimension(&aux.dimension).ok_or_else(|| {
                ProcessingError::InvalidFormat(format!(
                    "Auxiliary coordinate '{}' refers to unknown dimension '{}'",
                    aux.name, aux.dimension
                ))
            })?;
            if dim.len() != aux.values.len() {
                return Err(ProcessingError::ShapeMismatch {
                    variable: aux.name.clone(),
                    expected: dim.len(),
                    actual: aux.values.len(),
                });
            }
        }

        for variable in &self.variables {
            let mut expected = 1usize;
            for name in &variable.dims {
                let dim = self.dimension(name).ok_or_else(|| {
                    ProcessingError::InvalidFormat(format!(
                        "Variable '{}' refers to unknown dimension '{}'",
                        variable.meta.name, name
                    ))
                })?;
                expected *= dim.len();
            }
            if expected != variable.values.len() {
                return Err(ProcessingError::ShapeMismatch {
                    variable: variable.meta.name.clone(),
                    expected,
                    actual: variable.values.len(),
                });
            }
        }

        Ok(())
    }

    /// The cells of one station, keeping every other dimension whole.
    pub fn station_slice(&self, index: usize) -> Result<NormalizedOutput> {
        self.validate()?;
        let axis = self
            .dimensions
            .iter()
            .position(|d| d.name == DIM_STATION)
            .ok_or_else(|| {
                ProcessingError::InvalidFormat("Output has no station dimension".to_string())
            })?;
        let stations = self.dimensions[axis].len();
        if index >= stations {
            return Err(ProcessingError::InvalidFormat(format!(
                "Station index {} out of range for {} stations",
                index, stations
            )));
        }

        let mut dimensions = self.dimensions.clone();
        dimensions[axis].coordinates = match &self.dimensions[axis].coordinates {
            CoordinateValues::Time(v) => CoordinateValues::Time(vec![v[index]]),
            CoordinateValues::Integer(v) => CoordinateValues::Integer(vec![v[index]]),
            CoordinateValues::Float(v) => CoordinateValues::Float(vec![v[index]]),
        };
        let outer: usize = self.dimensions[..axis].iter().map(|d| d.len()).product();
        let inner: usize = self.dimensions[axis + 1..].iter().map(|d| d.len()).product();

        let mut slice = NormalizedOutput::new(dimensions);
        slice.attributes = self.attributes.clone();
        for aux in &self.auxiliary {
            let values = if aux.dimension == DIM_STATION {
                vec![aux.values[index]]
            } else {
                aux.values.clone()
            };
            slice.push_auxiliary(&aux.name, &aux.dimension, values);
        }

        let dim_names = self.dimension_names();
        for variable in &self.variables {
            if variable.dims != dim_names {
                return Err(ProcessingError::InvalidFormat(format!(
                    "Variable '{}' does not span every dimension",
                    variable.meta.name
                )));
            }
            let mut values = Vec::with_capacity(outer * inner);
            for o in 0..outer {
                let start = (o * stations + index) * inner;
                values.extend_from_slice(&variable.values[start..start + inner]);
            }
            slice.push_variable(variable.meta.clone(), values);
        }

        Ok(slice)
    }

    /// Human-readable overview of the container.
    pub fn summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str("Dimensions:\n");
        for dim in &self.dimensions {
            summary.push_str(&format!("  {}: {}\n", dim.name, dim.len()));
        }
        summary.push_str("Variables:\n");
        for variable in &self.variables {
            let missing = variable.values.iter().filter(|v| v.is_nan()).count();
            summary.push_str(&format!(
                "  {} ({}) [{}]: {} cells, {} missing\n",
                variable.meta.name,
                variable.meta.units,
                variable.dims.join(", "),
                variable.values.len(),
                missing
            ));
        }
        summary
    }
}
