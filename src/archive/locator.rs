use crate::error::{ProcessingError, Result};
use crate::utils::constants::{DEFAULT_PRODUCT, PRESSURE_LEVEL_KIND, SINGLE_LEVEL_KIND};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which ERA5 tree a variable lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    SingleLevel,
    PressureLevel,
}

impl Granularity {
    /// Level-kind token used in file names.
    pub fn level_kind(&self) -> &'static str {
        match self {
            Granularity::SingleLevel => SINGLE_LEVEL_KIND,
            Granularity::PressureLevel => PRESSURE_LEVEL_KIND,
        }
    }
}

/// Last calendar day of the month.
pub fn days_in_month(year: i32, month: u32) -> Result<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        ProcessingError::InvalidFormat(format!("Invalid year/month: {}-{:02}", year, month))
    })?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| {
        ProcessingError::InvalidFormat(format!("Month after {}-{:02} out of range", year, month))
    })?;

    Ok(next.signed_duration_since(first).num_days() as u32)
}

/// Maps (variable, year, month) onto the monthly archive files.
#[derive(Debug, Clone)]
pub struct FileLocator {
    single_level_root: PathBuf,
    pressure_level_root: PathBuf,
    product: String,
}

impl FileLocator {
    pub fn new(single_level_root: &Path, pressure_level_root: &Path) -> Self {
        Self {
            single_level_root: single_level_root.to_path_buf(),
            pressure_level_root: pressure_level_root.to_path_buf(),
            product: DEFAULT_PRODUCT.to_string(),
        }
    }

    pub fn with_product(mut self, product: &str) -> Self {
        self.product = product.to_string();
        self
    }

    pub fn root(&self, granularity: Granularity) -> &Path {
        match granularity {
            Granularity::SingleLevel => &self.single_level_root,
            Granularity::PressureLevel => &self.pressure_level_root,
        }
    }

    /// File name following `{var}_{product}_{kind}_{YYYY}{MM}01-{YYYY}{MM}{DD}.nc`.
    pub fn file_name(
        &self,
        variable_code: &str,
        year: i32,
        month: u32,
        granularity: Granularity,
    ) -> Result<String> {
        let last_day = days_in_month(year, month)?;
        Ok(format!(
            "{var}_{product}_{kind}_{y:04}{m:02}01-{y:04}{m:02}{d:02}.nc",
            var = variable_code,
            product = self.product,
            kind = granularity.level_kind(),
            y = year,
            m = month,
            d = last_day
        ))
    }

    /// Path the archive should hold, without touching the filesystem.
    pub fn expected_path(
        &self,
        variable_code: &str,
        year: i32,
        month: u32,
        granularity: Granularity,
    ) -> Result<PathBuf> {
        let name = self.file_name(variable_code, year, month, granularity)?;
        Ok(self
            .root(granularity)
            .join(variable_code)
            .join(format!("{:04}", year))
            .join(name))
    }

    /// Resolve the file, failing with `NotFound` when the archive has a gap.
    pub fn locate(
        &self,
        variable_code: &str,
        year: i32,
        month: u32,
        granularity: Granularity,
    ) -> Result<PathBuf> {
        let path = self.expected_path(variable_code, year, month, granularity)?;
        if path.is_file() {
            debug!(path = %path.display(), "located archive file");
            Ok(path)
        } else {
            Err(ProcessingError::NotFound { path })
        }
    }
}
