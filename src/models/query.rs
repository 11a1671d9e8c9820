use crate::models::{Station, StationId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Which time steps of a volume a query wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSelection {
    /// Every step in the volume (bulk extraction).
    All,
    /// The single step closest to the given instant.
    Nearest(NaiveDateTime),
    /// Every step inside the inclusive range.
    Range(NaiveDateTime, NaiveDateTime),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionQuery {
    pub variable: String,
    pub station: Station,
    pub time: TimeSelection,
    pub levels: Option<Vec<i32>>,
}

impl ExtractionQuery {
    pub fn new(variable: &str, station: Station) -> Self {
        Self {
            variable: variable.to_string(),
            station,
            time: TimeSelection::All,
            levels: None,
        }
    }

    pub fn with_time(mut self, time: TimeSelection) -> Self {
        self.time = time;
        self
    }

    pub fn with_levels(mut self, levels: Vec<i32>) -> Self {
        self.levels = Some(levels);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: NaiveDateTime,
    pub level: Option<i32>,
    pub value: f64,
}

/// Values pulled out of one volume for one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSlice {
    pub station: StationId,
    pub variable: String,
    /// Grid point actually used for the station.
    pub grid_latitude: f64,
    pub grid_longitude: f64,
    pub samples: Vec<Sample>,
    /// Requested levels absent from the volume's level axis.
    pub unresolved_levels: Vec<i32>,
}

impl ExtractedSlice {
    pub fn new(station: StationId, variable: &str, grid_latitude: f64, grid_longitude: f64) -> Self {
        Self {
            station,
            variable: variable.to_string(),
            grid_latitude,
            grid_longitude,
            samples: Vec::new(),
            unresolved_levels: Vec::new(),
        }
    }

    pub fn push(&mut self, time: NaiveDateTime, level: Option<i32>, value: f64) {
        self.samples.push(Sample { time, level, value });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn has_levels(&self) -> bool {
        self.samples.iter().any(|s| s.level.is_some())
    }

    /// Value at an exact (time, level), if present.
    pub fn value_at(&self, time: NaiveDateTime, level: Option<i32>) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| s.time == time && s.level == level)
            .map(|s| s.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_slice_lookup() {
        let t = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        let mut slice = ExtractedSlice::new(StationId(3), "t", -6.25, 106.75);
        slice.push(t, Some(850), 290.5);
        slice.push(t, Some(500), 268.0);

        assert_eq!(slice.len(), 2);
        assert!(slice.has_levels());
        assert_eq!(slice.value_at(t, Some(500)), Some(268.0));
        assert_eq!(slice.value_at(t, None), None);
    }
}
