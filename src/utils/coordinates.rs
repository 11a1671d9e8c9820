use crate::error::{ProcessingError, Result};

/// Bring a longitude into the canonical [-180, 180) range.
///
/// # Examples
/// ```
/// use era5_station_extract::utils::normalize_longitude;
///
/// assert_eq!(normalize_longitude(190.0), -170.0);
/// assert_eq!(normalize_longitude(180.0), -180.0);
/// assert_eq!(normalize_longitude(-45.5), -45.5);
/// ```
pub fn normalize_longitude(longitude: f64) -> f64 {
    let wrapped = (longitude + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Longitude convention of a grid's longitude axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongitudeConvention {
    /// [-180, 180)
    Signed,
    /// [0, 360)
    Positive,
}

impl LongitudeConvention {
    /// Any coordinate above 180 means the axis runs 0..360.
    pub fn detect(axis: &[f64]) -> Self {
        if axis.iter().any(|&lon| lon > 180.0) {
            LongitudeConvention::Positive
        } else {
            LongitudeConvention::Signed
        }
    }

    /// Convert a canonical longitude into this convention.
    pub fn convert(&self, longitude: f64) -> f64 {
        match self {
            LongitudeConvention::Signed => normalize_longitude(longitude),
            LongitudeConvention::Positive => longitude.rem_euclid(360.0),
        }
    }
}

/// Parse a decimal-degree coordinate field from the station catalog.
pub fn parse_decimal_degrees(field: &str, name: &str) -> Result<f64> {
    let trimmed = field.trim();
    let value = trimmed.parse::<f64>().map_err(|_| {
        ProcessingError::InvalidCoordinate(format!("Invalid {} value: '{}'", name, trimmed))
    })?;

    if !value.is_finite() {
        return Err(ProcessingError::InvalidCoordinate(format!(
            "Non-finite {} value: '{}'",
            name, trimmed
        )));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_longitude() {
        assert_eq!(normalize_longitude(0.0), 0.0);
        assert_eq!(normalize_longitude(359.75), -0.25);
        assert_eq!(normalize_longitude(-180.0), -180.0);
        assert_eq!(normalize_longitude(540.0), -180.0);
        assert!((normalize_longitude(106.75) - 106.75).abs() < 1e-12);
    }

    #[test]
    fn test_convention_detection() {
        assert_eq!(
            LongitudeConvention::detect(&[0.0, 90.0, 359.75]),
            LongitudeConvention::Positive
        );
        assert_eq!(
            LongitudeConvention::detect(&[-180.0, 0.0, 179.75]),
            LongitudeConvention::Signed
        );
    }

    #[test]
    fn test_convention_conversion() {
        assert_eq!(LongitudeConvention::Positive.convert(-0.25), 359.75);
        assert_eq!(LongitudeConvention::Positive.convert(106.75), 106.75);
        assert_eq!(LongitudeConvention::Signed.convert(270.0), -90.0);
    }

    #[test]
    fn test_parse_decimal_degrees() {
        assert_eq!(parse_decimal_degrees(" -6.25 ", "latitude").unwrap(), -6.25);
        assert!(parse_decimal_degrees("abc", "latitude").is_err());
        assert!(parse_decimal_degrees("NaN", "longitude").is_err());
    }
}
