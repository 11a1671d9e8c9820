use chrono::NaiveDateTime;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    NetCDF(#[from] netcdf::Error),

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Archive file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Variable '{variable}' missing in {source_name}")]
    VariableMissing {
        variable: String,
        source_name: String,
    },

    #[error("Pressure levels {levels:?} not found in {source_name}")]
    LevelNotFound {
        levels: Vec<i32>,
        source_name: String,
    },

    #[error(
        "Conflicting duplicate observation for station {station} at {time} (level {level:?}): {first} vs {second}"
    )]
    DuplicateObservation {
        station: u32,
        time: NaiveDateTime,
        level: Option<i32>,
        first: f64,
        second: f64,
    },

    #[error("Shape mismatch for '{variable}': expected {expected} values, found {actual}")]
    ShapeMismatch {
        variable: String,
        expected: usize,
        actual: usize,
    },

    #[error("Processing cancelled by user")]
    Cancelled,

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ProcessingError {
    /// Expected archive gaps: the unit of work is skipped and the run continues.
    pub fn is_data_gap(&self) -> bool {
        matches!(
            self,
            ProcessingError::NotFound { .. } | ProcessingError::VariableMissing { .. }
        )
    }
}
