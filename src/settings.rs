use crate::error::Result;
use crate::utils::constants::{
    COMPRESSION_SNAPPY, DEFAULT_END_YEAR, DEFAULT_PRESSURE_LEVEL_ROOT, DEFAULT_PRODUCT,
    DEFAULT_SINGLE_LEVEL_ROOT, DEFAULT_START_YEAR,
};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use validator::{Validate, ValidationError};

pub const ENV_PREFIX: &str = "ERA5X";

/// Run settings: built-in defaults, then an optional TOML file, then
/// `ERA5X_*` environment variables. Command-line flags are applied on top by
/// the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_year_range"))]
pub struct Settings {
    pub single_level_root: PathBuf,
    pub pressure_level_root: PathBuf,

    #[validate(length(min = 1))]
    pub product: String,

    #[validate(range(min = 1940, max = 2100))]
    pub start_year: i32,

    #[validate(range(min = 1940, max = 2100))]
    pub end_year: i32,

    pub output_dir: PathBuf,

    pub compression: String,

    #[validate(range(min = 1, max = 1024))]
    pub max_workers: usize,
}

fn validate_year_range(settings: &Settings) -> std::result::Result<(), ValidationError> {
    if settings.start_year > settings.end_year {
        return Err(ValidationError::new("start_year_after_end_year"));
    }
    Ok(())
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("single_level_root", DEFAULT_SINGLE_LEVEL_ROOT)?
            .set_default("pressure_level_root", DEFAULT_PRESSURE_LEVEL_ROOT)?
            .set_default("product", DEFAULT_PRODUCT)?
            .set_default("start_year", DEFAULT_START_YEAR as i64)?
            .set_default("end_year", DEFAULT_END_YEAR as i64)?
            .set_default("output_dir", "output")?
            .set_default("compression", COMPRESSION_SNAPPY)?
            .set_default("max_workers", num_cpus::get() as i64)?;

        if let Some(path) = path {
            debug!(path = %path.display(), "loading settings file");
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessingError;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_defaults() -> Result<()> {
        let settings = Settings::load(None)?;
        assert_eq!(settings.product, DEFAULT_PRODUCT);
        assert_eq!(settings.start_year, DEFAULT_START_YEAR);
        assert!(settings.max_workers >= 1);
        Ok(())
    }

    #[test]
    fn test_file_overrides_defaults() -> Result<()> {
        let mut file = Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "single_level_root = \"/data/era5/sfc\"")?;
        writeln!(file, "start_year = 2016")?;
        writeln!(file, "end_year = 2016")?;
        writeln!(file, "compression = \"zstd\"")?;

        let settings = Settings::load(Some(file.path()))?;
        assert_eq!(settings.single_level_root, PathBuf::from("/data/era5/sfc"));
        assert_eq!(settings.start_year, 2016);
        assert_eq!(settings.compression, "zstd");
        assert_eq!(settings.product, DEFAULT_PRODUCT);
        Ok(())
    }

    #[test]
    fn test_reversed_years_rejected() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "start_year = 2020\nend_year = 2019").unwrap();

        let result = Settings::load(Some(file.path()));
        assert!(matches!(result, Err(ProcessingError::Validation(_))));
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = Settings::load(Some(Path::new("/nonexistent/era5x.toml")));
        assert!(matches!(result, Err(ProcessingError::Settings(_))));
    }
}
