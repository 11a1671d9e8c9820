//! Decoding helpers for CF-convention metadata found in ERA5 NetCDF files.

use crate::error::{ProcessingError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Parsed `"<unit> since <epoch>"` time units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUnits {
    pub step_seconds: i64,
    pub epoch: NaiveDateTime,
}

impl TimeUnits {
    pub fn parse(units: &str) -> Result<Self> {
        let (unit, epoch) = units.split_once(" since ").ok_or_else(|| {
            ProcessingError::InvalidFormat(format!("Unrecognised time units: '{}'", units))
        })?;

        let step_seconds = match unit.trim().to_lowercase().as_str() {
            "seconds" | "second" | "secs" | "s" => 1,
            "minutes" | "minute" | "mins" => 60,
            "hours" | "hour" | "hrs" | "h" => 3_600,
            "days" | "day" | "d" => 86_400,
            other => {
                return Err(ProcessingError::InvalidFormat(format!(
                    "Unsupported time unit '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            step_seconds,
            epoch: parse_epoch(epoch)?,
        })
    }

    /// Convert a raw time coordinate to a timestamp, rounded to the second.
    pub fn decode(&self, raw: f64) -> Result<NaiveDateTime> {
        if !raw.is_finite() {
            return Err(ProcessingError::InvalidFormat(format!(
                "Non-finite time value {}",
                raw
            )));
        }
        let seconds = (raw * self.step_seconds as f64).round() as i64;
        self.epoch
            .checked_add_signed(Duration::seconds(seconds))
            .ok_or_else(|| {
                ProcessingError::InvalidFormat(format!("Time value {} overflows", raw))
            })
    }
}

fn parse_epoch(text: &str) -> Result<NaiveDateTime> {
    let cleaned = text
        .trim()
        .trim_end_matches("UTC")
        .trim_end_matches('Z')
        .trim();

    const FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for format in FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(cleaned, format) {
            return Ok(parsed);
        }
    }

    let date = NaiveDate::parse_from_str(cleaned, "%Y-%m-%d")?;
    Ok(date.and_time(chrono::NaiveTime::MIN))
}

/// Packing attributes of a stored variable (`scale_factor`, `add_offset`,
/// `_FillValue`, `missing_value`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Packing {
    pub scale_factor: f64,
    pub add_offset: f64,
    pub fill_value: Option<f64>,
    pub missing_value: Option<f64>,
}

impl Default for Packing {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            add_offset: 0.0,
            fill_value: None,
            missing_value: None,
        }
    }
}

impl Packing {
    /// Physical value of a raw stored value, NaN for fill or missing markers.
    pub fn unpack(&self, raw: f64) -> f64 {
        if self.fill_value == Some(raw) || self.missing_value == Some(raw) {
            return f64::NAN;
        }
        raw * self.scale_factor + self.add_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_era5_time_units() {
        let units = TimeUnits::parse("hours since 1900-01-01 00:00:00.0").unwrap();
        assert_eq!(units.step_seconds, 3_600);
        assert_eq!(
            units.epoch,
            NaiveDate::from_ymd_opt(1900, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );

        // 2016-02-01T00:00 is 1017576 hours after 1900-01-01
        let decoded = units.decode(1_017_576.0).unwrap();
        assert_eq!(
            decoded,
            NaiveDate::from_ymd_opt(2016, 2, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_parse_other_time_units() {
        let units = TimeUnits::parse("seconds since 1970-01-01").unwrap();
        assert_eq!(units.step_seconds, 1);
        let decoded = units.decode(86_400.0 + 3_600.0).unwrap();
        assert_eq!(
            decoded,
            NaiveDate::from_ymd_opt(1970, 1, 2)
                .unwrap()
                .and_hms_opt(1, 0, 0)
                .unwrap()
        );

        assert!(TimeUnits::parse("days since 2000-01-01T00:00:00Z").is_ok());
        assert!(TimeUnits::parse("fortnights since 2000-01-01").is_err());
        assert!(TimeUnits::parse("hours").is_err());
    }

    #[test]
    fn test_unpack() {
        let packing = Packing {
            scale_factor: 0.5,
            add_offset: 100.0,
            fill_value: Some(-32767.0),
            missing_value: None,
        };
        assert_eq!(packing.unpack(10.0), 105.0);
        assert!(packing.unpack(-32767.0).is_nan());
        assert_eq!(Packing::default().unpack(3.25), 3.25);
    }
}
