use crate::error::Result;
use crate::models::StationId;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Non-fatal condition raised while a work unit runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportEvent {
    MissingFile {
        path: PathBuf,
    },
    UnreadableFile {
        path: PathBuf,
        message: String,
    },
    VariableMissing {
        variable: String,
        file: String,
    },
    LevelsUnresolved {
        station: StationId,
        file: String,
        levels: Vec<i32>,
    },
    SelectionFailed {
        station: StationId,
        file: String,
        message: String,
    },
    EmptySelection {
        station: StationId,
        file: String,
        time: Option<NaiveDateTime>,
    },
    /// Two sources disagree on one cell; reassembly stops and no grid is built.
    ConflictingDuplicate {
        station: StationId,
        time: NaiveDateTime,
        level: Option<i32>,
        first: f64,
        second: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Everything a run skipped, resolved or produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub recipe: String,
    pub units_planned: usize,
    pub units_completed: usize,
    pub files_opened: usize,
    pub slices_extracted: usize,
    pub samples_extracted: usize,
    pub duplicates_resolved: usize,
    pub missing_files: Vec<PathBuf>,
    pub events: Vec<ReportEvent>,
    pub artifacts_written: Vec<PathBuf>,
    pub failed_artifacts: Vec<ArtifactFailure>,
}

impl RunReport {
    pub fn new(recipe: &str) -> Self {
        Self {
            recipe: recipe.to_string(),
            ..Default::default()
        }
    }

    /// Fold one event in. A missing file is listed once however many
    /// units or stations hit it.
    pub fn record(&mut self, event: ReportEvent) {
        if let ReportEvent::MissingFile { path } = &event {
            if self.missing_files.contains(path) {
                return;
            }
            self.missing_files.push(path.clone());
        }
        self.events.push(event);
    }

    pub fn record_artifact(&mut self, path: &Path) {
        self.artifacts_written.push(path.to_path_buf());
    }

    pub fn record_artifact_failure(&mut self, path: &Path, message: String) {
        self.failed_artifacts.push(ArtifactFailure {
            path: path.to_path_buf(),
            message,
        });
    }

    pub fn count(&self, kind: fn(&ReportEvent) -> bool) -> usize {
        self.events.iter().filter(|e| kind(e)).count()
    }

    /// An artifact could not be written or the grid could not be built.
    pub fn has_failures(&self) -> bool {
        !self.failed_artifacts.is_empty()
            || self.count(|e| matches!(e, ReportEvent::ConflictingDuplicate { .. })) > 0
    }

    /// Write the report as pretty JSON, creating the parent directory.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Generate a summary report
    pub fn generate_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str(&format!("=== Extraction Report ({}) ===\n", self.recipe));
        summary.push_str(&format!(
            "Work Units: {}/{} completed\n",
            self.units_completed, self.units_planned
        ));
        summary.push_str(&format!("Files Opened: {}\n", self.files_opened));
        summary.push_str(&format!("Missing Files: {}\n", self.missing_files.len()));
        summary.push_str(&format!(
            "Slices Extracted: {} ({} samples)\n",
            self.slices_extracted, self.samples_extracted
        ));
        summary.push_str(&format!(
            "Duplicates Resolved: {}\n",
            self.duplicates_resolved
        ));
        summary.push_str(&format!(
            "Missing Variables: {}\n",
            self.count(|e| matches!(e, ReportEvent::VariableMissing { .. }))
        ));
        summary.push_str(&format!(
            "Unresolved Levels: {}\n",
            self.count(|e| matches!(e, ReportEvent::LevelsUnresolved { .. }))
        ));
        summary.push_str(&format!(
            "Unreadable Files: {}\n",
            self.count(|e| matches!(e, ReportEvent::UnreadableFile { .. }))
        ));
        summary.push_str(&format!(
            "Failed Selections: {}\n",
            self.count(|e| matches!(e, ReportEvent::SelectionFailed { .. }))
        ));

        for event in &self.events {
            if let ReportEvent::ConflictingDuplicate {
                station,
                time,
                level,
                first,
                second,
            } = event
            {
                summary.push_str(&format!(
                    "\nConflicting duplicate at station {} {} (level {:?}): {} vs {}\n",
                    station, time, level, first, second
                ));
            }
        }

        if !self.missing_files.is_empty() {
            summary.push_str("\nFirst 10 Missing Files:\n");
            for (i, path) in self.missing_files.iter().take(10).enumerate() {
                summary.push_str(&format!("  {}. {}\n", i + 1, path.display()));
            }
        }

        if !self.artifacts_written.is_empty() {
            summary.push_str("\nWritten:\n");
            for path in &self.artifacts_written {
                summary.push_str(&format!("  {}\n", path.display()));
            }
        }

        if !self.failed_artifacts.is_empty() {
            summary.push_str("\nFailed Outputs:\n");
            for failure in &self.failed_artifacts {
                summary.push_str(&format!(
                    "  {}: {}\n",
                    failure.path.display(),
                    failure.message
                ));
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_recorded_once() {
        let mut report = RunReport::new("cape");
        let path = PathBuf::from("/archive/cape/2016/cape.nc");
        report.record(ReportEvent::MissingFile { path: path.clone() });
        report.record(ReportEvent::MissingFile { path: path.clone() });

        assert_eq!(report.missing_files, vec![path]);
        assert_eq!(report.events.len(), 1);
        assert!(report.generate_summary().contains("Missing Files: 1"));
    }

    #[test]
    fn test_summary_counts_events() {
        let mut report = RunReport::new("t");
        report.record(ReportEvent::LevelsUnresolved {
            station: StationId(2),
            file: "t.nc".to_string(),
            levels: vec![925],
        });
        report.record(ReportEvent::VariableMissing {
            variable: "t".to_string(),
            file: "t.nc".to_string(),
        });

        let summary = report.generate_summary();
        assert!(summary.contains("Unresolved Levels: 1"));
        assert!(summary.contains("Missing Variables: 1"));
        assert!(!report.has_failures());
    }

    #[test]
    fn test_conflict_marks_run_failed() {
        let mut report = RunReport::new("cape");
        report.record(ReportEvent::ConflictingDuplicate {
            station: StationId(3),
            time: chrono::NaiveDate::from_ymd_opt(2016, 1, 31)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            level: None,
            first: 1.0,
            second: 2.0,
        });

        assert!(report.has_failures());
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["events"][0]["kind"], "conflicting_duplicate");
        assert_eq!(value["events"][0]["second"], 2.0);
        assert!(report
            .generate_summary()
            .contains("Conflicting duplicate at station 3 2016-01-31 00:00:00"));
    }

    #[test]
    fn test_write_json() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested").join("run.report.json");

        let mut report = RunReport::new("wind");
        report.units_planned = 2;
        report.record(ReportEvent::MissingFile {
            path: PathBuf::from("u.nc"),
        });
        report.write_json(&path)?;

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(value["recipe"], "wind");
        assert_eq!(value["units_planned"], 2);
        assert_eq!(value["events"][0]["kind"], "missing_file");
        Ok(())
    }
}
