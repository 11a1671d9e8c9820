use crate::error::{ProcessingError, Result};
use crate::models::StationCatalog;
use crate::utils::constants::{COLUMN_DATE, COLUMN_LATITUDE, COLUMN_LONGITUDE};
use crate::utils::coordinates::parse_decimal_degrees;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Loads the station coordinate / extreme event CSV files.
pub struct StationReader {
    require_dates: bool,
}

impl StationReader {
    pub fn new() -> Self {
        Self {
            require_dates: false,
        }
    }

    /// Fail unless every row carries a `date` (extreme-event catalogs).
    pub fn with_require_dates(require_dates: bool) -> Self {
        Self { require_dates }
    }

    /// Read and validate the catalog at `path`.
    pub fn read_catalog(&self, path: &Path) -> Result<StationCatalog> {
        let bytes = fs::read(path).map_err(|e| {
            ProcessingError::Config(format!(
                "Cannot read station catalog {}: {}",
                path.display(),
                e
            ))
        })?;
        let catalog = self.parse_catalog(&bytes)?;
        info!(
            path = %path.display(),
            rows = catalog.len(),
            locations = catalog.locations().len(),
            "loaded station catalog"
        );
        Ok(catalog)
    }

    /// Parse catalog bytes: UTF-8 with optional BOM, `,` or `;` delimited.
    pub fn parse_catalog(&self, bytes: &[u8]) -> Result<StationCatalog> {
        let (text, _) = encoding_rs::UTF_8.decode_with_bom_removal(bytes);
        let delimiter = sniff_delimiter(&text);
        debug!(delimiter = %(delimiter as char), "parsing station catalog");

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        let column = |name: &str| headers.iter().position(|h| h == name);

        let (lat_idx, lon_idx) = match (column(COLUMN_LATITUDE), column(COLUMN_LONGITUDE)) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                return Err(ProcessingError::Config(format!(
                    "Station catalog is missing required columns '{}' and/or '{}' (found {:?})",
                    COLUMN_LATITUDE, COLUMN_LONGITUDE, headers
                )))
            }
        };
        let date_idx = column(COLUMN_DATE);
        if self.require_dates && date_idx.is_none() {
            return Err(ProcessingError::Config(format!(
                "Station catalog is missing required column '{}'",
                COLUMN_DATE
            )));
        }

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            if record.iter().all(|f| f.is_empty()) {
                continue;
            }

            let field = |idx: usize| record.get(idx).unwrap_or("");
            let latitude = parse_decimal_degrees(field(lat_idx), COLUMN_LATITUDE)?;
            let longitude = parse_decimal_degrees(field(lon_idx), COLUMN_LONGITUDE)?;
            let date = match date_idx.map(field) {
                Some(text) if !text.is_empty() => Some(parse_event_time(text)?),
                _ if self.require_dates => {
                    return Err(ProcessingError::Config(format!(
                        "Row {} of the station catalog has no date",
                        line + 2
                    )))
                }
                _ => None,
            };

            rows.push((latitude, longitude, date));
        }

        StationCatalog::from_rows(rows)
    }
}

impl Default for StationReader {
    fn default() -> Self {
        Self::new()
    }
}

/// `;` when the header line uses it and has no commas, `,` otherwise.
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    if header.contains(';') && !header.contains(',') {
        b';'
    } else {
        b','
    }
}

/// Event times come as timestamps or plain dates; a plain date means 00:00.
pub fn parse_event_time(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    for format in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(datetime);
        }
    }
    for format in ["%d/%m/%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Ok(date.and_time(NaiveTime::MIN));
        }
    }
    Ok(NaiveDate::parse_from_str(text, "%Y-%m-%d")?.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StationId;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_headers_are_trimmed() {
        let csv = b" latitude , longitude ,name\n-6.25,106.75,Jakarta\n1.35,103.82,Singapore\n";
        let catalog = StationReader::new().parse_catalog(csv).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.rows()[0].latitude, -6.25);
        assert_eq!(catalog.rows()[1].longitude, 103.82);
        assert_eq!(catalog.rows()[1].id, StationId(1));
        assert!(catalog.rows()[0].anchor.is_none());
    }

    #[test]
    fn test_semicolon_and_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"station;latitude;longitude\nA;-6.25;106.75\n");
        let catalog = StationReader::new().parse_catalog(&bytes).unwrap();

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.rows()[0].latitude, -6.25);
    }

    #[test]
    fn test_missing_columns_is_config_error() {
        let result = StationReader::new().parse_catalog(b"lat,lon\n1,2\n");
        assert!(matches!(result, Err(ProcessingError::Config(_))));
    }

    #[test]
    fn test_event_dates() {
        let csv = b"date,longitude,latitude\n2016-02-29,106.75,-6.25\n2018-07-09 00:00:00,106.75,-6.25\n";
        let catalog = StationReader::with_require_dates(true)
            .parse_catalog(csv)
            .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.rows()[0].anchor,
            NaiveDate::from_ymd_opt(2016, 2, 29).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(
            catalog.rows()[1].anchor,
            NaiveDate::from_ymd_opt(2018, 7, 9).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(catalog.rows()[0].id, catalog.rows()[1].id);
    }

    #[test]
    fn test_event_time_of_day_is_kept() {
        let expected = NaiveDate::from_ymd_opt(2017, 11, 3)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(parse_event_time("2017-11-03 14:30:00").unwrap(), expected);
        assert_eq!(parse_event_time("2017-11-03T14:30").unwrap(), expected);
        assert_eq!(
            parse_event_time("03/11/2017").unwrap(),
            expected.date().and_hms_opt(0, 0, 0).unwrap()
        );
        assert!(parse_event_time("yesterday").is_err());
    }

    #[test]
    fn test_dates_required_for_events() {
        let result = StationReader::with_require_dates(true)
            .parse_catalog(b"latitude,longitude\n1.0,2.0\n");
        assert!(matches!(result, Err(ProcessingError::Config(_))));

        let result = StationReader::with_require_dates(true)
            .parse_catalog(b"latitude,longitude,date\n1.0,2.0,\n");
        assert!(matches!(result, Err(ProcessingError::Config(_))));
    }

    #[test]
    fn test_read_catalog_file() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "latitude,longitude")?;
        writeln!(temp_file, "-6.25,106.75")?;
        writeln!(temp_file)?;
        writeln!(temp_file, "-7.5,110.25")?;

        let catalog = StationReader::new().read_catalog(temp_file.path())?;
        assert_eq!(catalog.len(), 2);
        Ok(())
    }

    #[test]
    fn test_unreadable_catalog_is_config_error() {
        let result = StationReader::new().read_catalog(Path::new("/nonexistent/stations.csv"));
        assert!(matches!(result, Err(ProcessingError::Config(_))));
    }
}
