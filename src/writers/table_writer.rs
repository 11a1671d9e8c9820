use crate::error::Result;
use crate::models::NormalizedOutput;
use std::fs;
use std::path::Path;
use tracing::info;

/// Flat delimited export of a [`NormalizedOutput`]: one row per cell with
/// dimension coordinates, auxiliary coordinates and variables as columns.
pub struct TableWriter;

impl TableWriter {
    pub fn new() -> Self {
        Self
    }

    /// Missing cells are written as empty fields.
    pub fn write_table(&self, output: &NormalizedOutput, path: &Path) -> Result<()> {
        output.validate()?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::Writer::from_path(path)?;

        let mut header: Vec<String> = output.dimension_names();
        header.extend(output.auxiliary.iter().map(|a| a.name.clone()));
        header.extend(output.variables.iter().map(|v| v.meta.name.clone()));
        writer.write_record(&header)?;

        let lengths: Vec<usize> = output.dimensions.iter().map(|d| d.len()).collect();
        let strides: Vec<usize> = (0..lengths.len())
            .map(|i| lengths[i + 1..].iter().product())
            .collect();
        let aux_dims: Vec<Option<usize>> = output
            .auxiliary
            .iter()
            .map(|a| output.dimensions.iter().position(|d| d.name == a.dimension))
            .collect();

        let rows = output.cell_count();
        for row in 0..rows {
            let index = |d: usize| (row / strides[d]) % lengths[d];
            let mut record: Vec<String> = Vec::with_capacity(header.len());

            for (d, dim) in output.dimensions.iter().enumerate() {
                record.push(dim.coordinates.format_at(index(d)));
            }
            for (aux, dim) in output.auxiliary.iter().zip(&aux_dims) {
                let value = dim.map_or(f64::NAN, |d| aux.values[index(d)]);
                record.push(format_value(value));
            }
            for variable in &output.variables {
                record.push(format_value(variable.values[row]));
            }
            writer.write_record(&record)?;
        }

        writer.flush()?;
        info!(path = %path.display(), rows, "wrote table");
        Ok(())
    }
}

impl Default for TableWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessingError;
    use crate::models::output::{DIM_STATION, DIM_TIME};
    use crate::models::{CoordinateValues, Dimension, VariableMeta};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample() -> NormalizedOutput {
        let t0 = NaiveDate::from_ymd_opt(2016, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut output = NormalizedOutput::new(vec![
            Dimension::new(DIM_TIME, CoordinateValues::Time(vec![t0])),
            Dimension::new(DIM_STATION, CoordinateValues::Integer(vec![0, 1])),
        ]);
        output.push_auxiliary("latitude", DIM_STATION, vec![-6.25, 1.5]);
        output.push_variable(
            VariableMeta::new("tcwv", "kg m-2", "Total column water vapour"),
            vec![55.5, f64::NAN],
        );
        output
    }

    #[test]
    fn test_write_table() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("tables").join("tcwv_all_days.csv");

        TableWriter::new().write_table(&sample(), &path)?;
        let text = fs::read_to_string(&path)?;
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "time,station,latitude,tcwv");
        assert_eq!(lines[1], "2016-02-01 00:00:00,0,-6.25,55.5");
        assert_eq!(lines[2], "2016-02-01 00:00:00,1,1.5,");
        assert_eq!(lines.len(), 3);
        Ok(())
    }

    #[test]
    fn test_invalid_output_rejected() {
        let dir = TempDir::new().unwrap();
        let mut output = sample();
        output.auxiliary[0].values.pop();

        let result = TableWriter::new().write_table(&output, &dir.path().join("t.csv"));
        assert!(matches!(result, Err(ProcessingError::ShapeMismatch { .. })));
    }
}
