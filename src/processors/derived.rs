//! Closed-form derived quantities.

use crate::utils::constants::ZERO_CELSIUS_IN_KELVIN;

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - ZERO_CELSIUS_IN_KELVIN
}

/// Linear dew point approximation, `t - (100 - rh) / 5`.
///
/// Reasonable for RH above about 50%. `rh` is expected in [0, 100].
pub fn dew_point(temperature_c: f64, relative_humidity: f64) -> f64 {
    temperature_c - (100.0 - relative_humidity) / 5.0
}

/// K-index from temperatures and dew points in degrees Celsius.
pub fn k_index(t850: f64, t700: f64, t500: f64, td850: f64, td700: f64) -> f64 {
    (t850 - t500) + td850 - (t700 - td700)
}

/// K-index with the dew points derived from relative humidity.
pub fn k_index_from_humidity(t850: f64, t700: f64, t500: f64, rh850: f64, rh700: f64) -> f64 {
    k_index(
        t850,
        t700,
        t500,
        dew_point(t850, rh850),
        dew_point(t700, rh700),
    )
}

pub fn wind_speed(u: f64, v: f64) -> f64 {
    u.hypot(v)
}

/// Meteorological direction the wind blows from, degrees in [0, 360).
pub fn wind_direction(u: f64, v: f64) -> f64 {
    let direction = (270.0 - v.atan2(u).to_degrees()).rem_euclid(360.0);
    if direction >= 360.0 {
        0.0
    } else {
        direction
    }
}
