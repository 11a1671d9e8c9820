use crate::error::{ProcessingError, Result};
use crate::utils::coordinates::normalize_longitude;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use validator::Validate;

/// Identity of a station location. Rows of the catalog that share the same
/// coordinates share the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StationId(pub u32);

impl std::fmt::Display for StationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Station {
    pub id: StationId,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    /// Event time for extreme-days catalogs; midnight when only a date was given.
    pub anchor: Option<NaiveDateTime>,
}

impl Station {
    /// Build a station, normalising the longitude to [-180, 180).
    pub fn new(id: u32, latitude: f64, longitude: f64, anchor: Option<NaiveDateTime>) -> Self {
        Self {
            id: StationId(id),
            latitude,
            longitude: normalize_longitude(longitude),
            anchor,
        }
    }
}

/// All stations of a run, loaded once and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct StationCatalog {
    stations: Vec<Station>,
}

impl StationCatalog {
    /// Build a catalog from raw rows, assigning ids by first occurrence of each
    /// (latitude, longitude) pair.
    ///
    /// Longitudes may use either convention, [-180, 180) or [0, 360); anything
    /// outside [-180, 360) is rejected rather than wrapped.
    pub fn from_rows(rows: Vec<(f64, f64, Option<NaiveDateTime>)>) -> Result<Self> {
        let mut ids: HashMap<(u64, u64), u32> = HashMap::new();
        let mut stations = Vec::with_capacity(rows.len());

        for (latitude, longitude, anchor) in rows {
            if !latitude.is_finite() || !longitude.is_finite() {
                return Err(ProcessingError::InvalidCoordinate(format!(
                    "non-finite station coordinate ({}, {})",
                    latitude, longitude
                )));
            }
            if !(-180.0..360.0).contains(&longitude) {
                return Err(ProcessingError::InvalidCoordinate(format!(
                    "station longitude {} outside [-180, 360)",
                    longitude
                )));
            }
            let longitude = normalize_longitude(longitude);
            let key = (latitude.to_bits(), longitude.to_bits());
            let next_id = ids.len() as u32;
            let id = *ids.entry(key).or_insert(next_id);

            let station = Station::new(id, latitude, longitude, anchor);
            station.validate()?;
            stations.push(station);
        }

        Ok(Self { stations })
    }

    pub fn rows(&self) -> &[Station] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// One station per distinct location, ordered by id.
    pub fn locations(&self) -> Vec<Station> {
        let mut unique: BTreeMap<StationId, Station> = BTreeMap::new();
        for station in &self.stations {
            unique.entry(station.id).or_insert_with(|| Station {
                anchor: None,
                ..station.clone()
            });
        }
        unique.into_values().collect()
    }

    pub fn has_anchors(&self) -> bool {
        !self.stations.is_empty() && self.stations.iter().all(|s| s.anchor.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn midnight(y: i32, m: u32, d: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(y, m, d).and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    #[test]
    fn test_station_validation() {
        let station = Station::new(0, -6.2, 106.8, None);
        assert!(station.validate().is_ok());

        let invalid = Station::new(1, 91.0, 106.8, None);
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_longitude_normalised_on_construction() {
        let station = Station::new(0, 1.0, 259.5, None);
        assert!((station.longitude - -100.5).abs() < 1e-12);
    }

    #[test]
    fn test_catalog_shares_ids_for_same_location() {
        let d1 = midnight(2016, 2, 3);
        let d2 = midnight(2018, 7, 9);
        let catalog = StationCatalog::from_rows(vec![
            (-6.25, 106.75, d1),
            (1.5, 104.0, d1),
            (-6.25, 106.75, d2),
        ])
        .unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.rows()[0].id, catalog.rows()[2].id);
        assert_ne!(catalog.rows()[0].id, catalog.rows()[1].id);

        let locations = catalog.locations();
        assert_eq!(locations.len(), 2);
        assert!(locations.iter().all(|s| s.anchor.is_none()));
        assert!(catalog.has_anchors());
    }

    #[test]
    fn test_catalog_rejects_out_of_range_latitude() {
        assert!(StationCatalog::from_rows(vec![(95.0, 10.0, None)]).is_err());
        assert!(StationCatalog::from_rows(vec![(f64::NAN, 10.0, None)]).is_err());
    }

    #[test]
    fn test_catalog_accepts_both_longitude_conventions() {
        let catalog =
            StationCatalog::from_rows(vec![(0.0, -180.0, None), (0.0, 359.75, None)]).unwrap();
        assert_eq!(catalog.rows()[0].longitude, -180.0);
        assert!((catalog.rows()[1].longitude - -0.25).abs() < 1e-12);
    }

    #[test]
    fn test_catalog_rejects_longitude_beyond_either_convention() {
        for longitude in [500.0, 360.0, -180.5, -540.0] {
            let result = StationCatalog::from_rows(vec![(0.0, longitude, None)]);
            assert!(
                matches!(result, Err(ProcessingError::InvalidCoordinate(_))),
                "longitude {} accepted",
                longitude
            );
        }
    }
}
