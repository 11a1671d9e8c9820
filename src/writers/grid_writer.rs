use crate::error::{ProcessingError, Result};
use crate::models::{
    AuxiliaryCoordinate, CoordinateValues, DataVariable, Dimension, NormalizedOutput,
    VariableMeta,
};
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DEFAULT_ROW_GROUP_SIZE, META_ATTRIBUTES, META_AUXILIARY, META_DESCRIPTION, META_DIMENSIONS,
    META_UNITS,
};
use arrow::array::{ArrayRef, Float64Array, Int64Array, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Auxiliary coordinate as stored in the schema metadata. JSON has no NaN,
/// so missing entries travel as `null`.
#[derive(Debug, Serialize, Deserialize)]
struct StoredAuxiliary {
    name: String,
    dimension: String,
    values: Vec<Option<f64>>,
}

impl From<&AuxiliaryCoordinate> for StoredAuxiliary {
    fn from(aux: &AuxiliaryCoordinate) -> Self {
        Self {
            name: aux.name.clone(),
            dimension: aux.dimension.clone(),
            values: aux
                .values
                .iter()
                .map(|v| if v.is_nan() { None } else { Some(*v) })
                .collect(),
        }
    }
}

impl From<StoredAuxiliary> for AuxiliaryCoordinate {
    fn from(stored: StoredAuxiliary) -> Self {
        Self {
            name: stored.name,
            dimension: stored.dimension,
            values: stored
                .values
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect(),
        }
    }
}

/// Writes a [`NormalizedOutput`] as a self-describing Parquet grid: one row
/// per cell, row-major over the dimensions.
pub struct GridWriter {
    compression: Compression,
    row_group_size: usize,
}

impl GridWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = parse_compression(compression)?;
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size.max(1);
        self
    }

    pub fn write_grid(&self, output: &NormalizedOutput, path: &Path) -> Result<()> {
        output.validate()?;
        let dim_names = output.dimension_names();
        for variable in &output.variables {
            if variable.dims != dim_names {
                return Err(ProcessingError::InvalidFormat(format!(
                    "Variable '{}' spans {:?}, grid rows span {:?}",
                    variable.meta.name, variable.dims, dim_names
                )));
            }
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let schema = self.create_schema(output)?;
        let batch = self.output_to_batch(output, schema.clone())?;

        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
        if batch.num_rows() > 0 {
            writer.write(&batch)?;
        }
        writer.close()?;

        info!(
            path = %path.display(),
            rows = batch.num_rows(),
            variables = output.variables.len(),
            "wrote grid"
        );
        Ok(())
    }

    fn create_schema(&self, output: &NormalizedOutput) -> Result<Arc<Schema>> {
        let mut fields = Vec::new();

        for dim in &output.dimensions {
            let data_type = match dim.coordinates {
                CoordinateValues::Time(_) => DataType::Timestamp(TimeUnit::Millisecond, None),
                CoordinateValues::Integer(_) => DataType::Int64,
                CoordinateValues::Float(_) => DataType::Float64,
            };
            fields.push(Field::new(&dim.name, data_type, false));
        }
        for aux in &output.auxiliary {
            fields.push(Field::new(&aux.name, DataType::Float64, false));
        }
        for variable in &output.variables {
            let metadata = HashMap::from([
                (META_UNITS.to_string(), variable.meta.units.clone()),
                (
                    META_DESCRIPTION.to_string(),
                    variable.meta.description.clone(),
                ),
            ]);
            fields.push(
                Field::new(&variable.meta.name, DataType::Float64, false).with_metadata(metadata),
            );
        }

        let auxiliary: Vec<StoredAuxiliary> = output.auxiliary.iter().map(Into::into).collect();
        let metadata = HashMap::from([
            (
                META_DIMENSIONS.to_string(),
                serde_json::to_string(&output.dimensions)?,
            ),
            (META_AUXILIARY.to_string(), serde_json::to_string(&auxiliary)?),
            (
                META_ATTRIBUTES.to_string(),
                serde_json::to_string(&output.attributes)?,
            ),
        ]);

        Ok(Arc::new(Schema::new_with_metadata(fields, metadata)))
    }

    fn output_to_batch(&self, output: &NormalizedOutput, schema: Arc<Schema>) -> Result<RecordBatch> {
        let rows = output.cell_count();
        let lengths: Vec<usize> = output.dimensions.iter().map(|d| d.len()).collect();
        let strides: Vec<usize> = (0..lengths.len())
            .map(|i| lengths[i + 1..].iter().product())
            .collect();
        let position = |name: &str| output.dimensions.iter().position(|d| d.name == name);

        let mut columns: Vec<ArrayRef> = Vec::new();

        for (i, dim) in output.dimensions.iter().enumerate() {
            let index = |row: usize| (row / strides[i]) % lengths[i];
            let column: ArrayRef = match &dim.coordinates {
                CoordinateValues::Time(times) => Arc::new(TimestampMillisecondArray::from(
                    (0..rows)
                        .map(|r| times[index(r)].and_utc().timestamp_millis())
                        .collect::<Vec<i64>>(),
                )),
                CoordinateValues::Integer(values) => Arc::new(Int64Array::from(
                    (0..rows).map(|r| values[index(r)]).collect::<Vec<i64>>(),
                )),
                CoordinateValues::Float(values) => Arc::new(Float64Array::from(
                    (0..rows).map(|r| values[index(r)]).collect::<Vec<f64>>(),
                )),
            };
            columns.push(column);
        }

        for aux in &output.auxiliary {
            let d = position(&aux.dimension).ok_or_else(|| {
                ProcessingError::InvalidFormat(format!(
                    "Auxiliary coordinate '{}' has no dimension '{}'",
                    aux.name, aux.dimension
                ))
            })?;
            let values: Vec<f64> = (0..rows)
                .map(|r| aux.values[(r / strides[d]) % lengths[d]])
                .collect();
            columns.push(Arc::new(Float64Array::from(values)));
        }

        for variable in &output.variables {
            columns.push(Arc::new(Float64Array::from(variable.values.clone())));
        }

        Ok(RecordBatch::try_new(schema, columns)?)
    }
}

impl Default for GridWriter {
    fn default() -> Self {
        Self::new()
    }
}

pub fn parse_compression(compression: &str) -> Result<Compression> {
    match compression.to_lowercase().as_str() {
        COMPRESSION_SNAPPY => Ok(Compression::SNAPPY),
        COMPRESSION_GZIP => Ok(Compression::GZIP(GzipLevel::default())),
        COMPRESSION_LZ4 => Ok(Compression::LZ4),
        COMPRESSION_ZSTD => Ok(Compression::ZSTD(ZstdLevel::default())),
        COMPRESSION_NONE => Ok(Compression::UNCOMPRESSED),
        _ => Err(ProcessingError::Config(format!(
            "Unsupported compression: {}",
            compression
        ))),
    }
}

fn schema_entry<T: serde::de::DeserializeOwned>(
    metadata: &HashMap<String, String>,
    key: &str,
) -> Result<T> {
    let text = metadata.get(key).ok_or_else(|| {
        ProcessingError::InvalidFormat(format!("Grid file lacks '{}' metadata", key))
    })?;
    Ok(serde_json::from_str(text)?)
}

/// Restore a container written by [`GridWriter::write_grid`].
pub fn read_grid(path: &Path) -> Result<NormalizedOutput> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let metadata = schema.metadata();

    let dimensions: Vec<Dimension> = schema_entry(metadata, META_DIMENSIONS)?;
    let auxiliary: Vec<StoredAuxiliary> = schema_entry(metadata, META_AUXILIARY)?;
    let attributes: BTreeMap<String, String> = schema_entry(metadata, META_ATTRIBUTES)?;

    let mut output = NormalizedOutput::new(dimensions);
    output.auxiliary = auxiliary.into_iter().map(Into::into).collect();
    output.attributes = attributes;

    let dim_names = output.dimension_names();
    let variable_columns: Vec<(usize, VariableMeta)> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !dim_names.contains(f.name()) && output.auxiliary(f.name()).is_none())
        .map(|(i, f)| {
            let attribute = |key: &str| f.metadata().get(key).cloned().unwrap_or_default();
            (
                i,
                VariableMeta {
                    name: f.name().clone(),
                    units: attribute(META_UNITS),
                    description: attribute(META_DESCRIPTION),
                },
            )
        })
        .collect();

    let mut values: Vec<Vec<f64>> = vec![Vec::new(); variable_columns.len()];
    for batch in builder.build()? {
        let batch = batch?;
        for (slot, (column, meta)) in variable_columns.iter().enumerate() {
            let array = batch
                .column(*column)
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| {
                    ProcessingError::InvalidFormat(format!(
                        "Invalid {} column type",
                        meta.name
                    ))
                })?;
            values[slot].extend_from_slice(array.values());
        }
    }

    for ((_, meta), values) in variable_columns.into_iter().zip(values) {
        output.variables.push(DataVariable {
            meta,
            dims: dim_names.clone(),
            values,
        });
    }

    output.validate()?;
    Ok(output)
}

/// Size and layout of a grid file.
#[derive(Debug)]
pub struct GridFileInfo {
    pub total_rows: i64,
    pub row_groups: i32,
    pub file_size: u64,
    pub dimensions: Vec<(String, usize)>,
    pub variables: Vec<(String, String)>,
    pub attributes: BTreeMap<String, String>,
}

impl GridFileInfo {
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Grid File Summary:\n\
            - Total rows: {}\n\
            - Row groups: {}\n\
            - File size: {:.2} MB\n",
            self.total_rows,
            self.row_groups,
            self.file_size as f64 / 1_048_576.0
        );
        summary.push_str("- Dimensions:\n");
        for (name, len) in &self.dimensions {
            summary.push_str(&format!("    {}: {}\n", name, len));
        }
        summary.push_str("- Variables:\n");
        for (name, units) in &self.variables {
            summary.push_str(&format!("    {} ({})\n", name, units));
        }
        for (key, value) in &self.attributes {
            summary.push_str(&format!("- {}: {}\n", key, value));
        }
        summary
    }
}

/// Get file statistics
pub fn grid_info(path: &Path) -> Result<GridFileInfo> {
    use parquet::file::reader::{FileReader, SerializedFileReader};

    let reader = SerializedFileReader::new(File::open(path)?)?;
    let metadata = reader.metadata();
    let total_rows = metadata.file_metadata().num_rows();
    let row_groups = metadata.num_row_groups() as i32;
    let file_size = fs::metadata(path)?.len();

    let output = read_grid(path)?;
    Ok(GridFileInfo {
        total_rows,
        row_groups,
        file_size,
        dimensions: output
            .dimensions
            .iter()
            .map(|d| (d.name.clone(), d.len()))
            .collect(),
        variables: output
            .variables
            .iter()
            .map(|v| (v.meta.name.clone(), v.meta.units.clone()))
            .collect(),
        attributes: output.attributes,
    })
}
