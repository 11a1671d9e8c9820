use crate::error::{ProcessingError, Result};
use crate::models::output::{DIM_LEVEL, DIM_STATION, DIM_TIME};
use crate::models::{CoordinateValues, NormalizedOutput, Variable, VariableMeta};
use crate::processors::derived::{
    k_index_from_humidity, kelvin_to_celsius, wind_direction, wind_speed,
};
use crate::processors::reassembler::time_mean;
use crate::utils::constants::{
    K_INDEX_HUMIDITY_LEVELS, K_INDEX_TEMPERATURE_LEVELS, WIND_PROFILE_LEVELS,
};

/// What a run extracts and how the extracted variables turn into output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipe {
    Single(Variable),
    KIndex,
    Wind,
}

impl Recipe {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "kindex" | "k_index" => Ok(Recipe::KIndex),
            "wind" => Ok(Recipe::Wind),
            other => Variable::from_code(other).map(Recipe::Single).ok_or_else(|| {
                ProcessingError::Config(format!(
                    "Unknown variable '{}' (expected cape, cin, tcwv, t, r, u, v, kindex or wind)",
                    name
                ))
            }),
        }
    }

    /// Token used in output file names.
    pub fn name(&self) -> &'static str {
        match self {
            Recipe::Single(variable) => variable.code(),
            Recipe::KIndex => "kindex",
            Recipe::Wind => "wind",
        }
    }

    pub fn inputs(&self) -> Vec<Variable> {
        match self {
            Recipe::Single(variable) => vec![*variable],
            Recipe::KIndex => vec![Variable::Temperature, Variable::RelativeHumidity],
            Recipe::Wind => vec![Variable::UWind, Variable::VWind],
        }
    }

    /// Pressure levels to request for one input, or `None` for every level
    /// the file has (surface inputs never get levels).
    pub fn levels_for(&self, variable: Variable, requested: Option<&[i32]>) -> Option<Vec<i32>> {
        if variable.granularity() == crate::archive::Granularity::SingleLevel {
            return None;
        }
        match (self, variable) {
            (Recipe::KIndex, Variable::Temperature) => Some(K_INDEX_TEMPERATURE_LEVELS.to_vec()),
            (Recipe::KIndex, _) => Some(K_INDEX_HUMIDITY_LEVELS.to_vec()),
            (Recipe::Wind, _) => Some(
                requested
                    .map(<[i32]>::to_vec)
                    .unwrap_or_else(|| WIND_PROFILE_LEVELS.to_vec()),
            ),
            (Recipe::Single(_), _) => requested.map(<[i32]>::to_vec),
        }
    }

    pub fn input_metas(&self) -> Vec<VariableMeta> {
        self.inputs().iter().map(Variable::meta).collect()
    }

    /// Wind profiles are always averaged over time.
    pub fn always_time_mean(&self) -> bool {
        matches!(self, Recipe::Wind)
    }

    /// Turn the reassembled inputs into the recipe's output variables.
    pub fn finish(&self, inputs: NormalizedOutput, average: bool) -> Result<NormalizedOutput> {
        match self {
            Recipe::Single(_) if average => time_mean(&inputs),
            Recipe::Single(_) => Ok(inputs),
            Recipe::KIndex => {
                let output = k_index_output(&inputs)?;
                if average {
                    time_mean(&output)
                } else {
                    Ok(output)
                }
            }
            Recipe::Wind => wind_output(&time_mean(&inputs)?),
        }
    }
}

impl std::fmt::Display for Recipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn input_values<'a>(inputs: &'a NormalizedOutput, name: &str) -> Result<&'a [f64]> {
    inputs
        .variable(name)
        .map(|v| v.values.as_slice())
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("Input variable '{}' absent", name)))
}

fn level_coordinates(inputs: &NormalizedOutput) -> Vec<i64> {
    match inputs.dimension(DIM_LEVEL).map(|d| &d.coordinates) {
        Some(CoordinateValues::Integer(levels)) => levels.clone(),
        _ => Vec::new(),
    }
}

/// K-index per (time, station) from the 850/700/500 hPa temperature and the
/// 850/700 hPa humidity. Any missing input leaves the cell NaN.
fn k_index_output(inputs: &NormalizedOutput) -> Result<NormalizedOutput> {
    let temperature = input_values(inputs, Variable::Temperature.code())?;
    let humidity = input_values(inputs, Variable::RelativeHumidity.code())?;

    let levels = level_coordinates(inputs);
    let n_levels = levels.len();
    let n_times = inputs.dimension(DIM_TIME).map_or(0, |d| d.len());
    let n_stations = inputs.dimension(DIM_STATION).map_or(0, |d| d.len());
    let position = |level: i32| levels.iter().position(|l| *l == level as i64);

    let at = |values: &[f64], t: usize, s: usize, level: i32| -> f64 {
        match position(level) {
            Some(l) => values[(t * n_stations + s) * n_levels + l],
            None => f64::NAN,
        }
    };

    let mut k = Vec::with_capacity(n_times * n_stations);
    for t in 0..n_times {
        for s in 0..n_stations {
            let t850 = kelvin_to_celsius(at(temperature, t, s, 850));
            let t700 = kelvin_to_celsius(at(temperature, t, s, 700));
            let t500 = kelvin_to_celsius(at(temperature, t, s, 500));
            let rh850 = at(humidity, t, s, 850);
            let rh700 = at(humidity, t, s, 700);
            k.push(k_index_from_humidity(t850, t700, t500, rh850, rh700));
        }
    }

    let dimensions = inputs
        .dimensions
        .iter()
        .filter(|d| d.name != DIM_LEVEL)
        .cloned()
        .collect();
    let mut output = NormalizedOutput::new(dimensions);
    output.auxiliary = inputs.auxiliary.clone();
    output.attributes = inputs.attributes.clone();
    output.push_variable(VariableMeta::k_index(), k);
    output.validate()?;
    Ok(output)
}

/// Speed and direction from time-averaged u and v.
fn wind_output(means: &NormalizedOutput) -> Result<NormalizedOutput> {
    let u = input_values(means, Variable::UWind.code())?;
    let v = input_values(means, Variable::VWind.code())?;

    let speed = u.iter().zip(v).map(|(u, v)| wind_speed(*u, *v)).collect();
    let direction = u
        .iter()
        .zip(v)
        .map(|(u, v)| {
            if u.is_nan() || v.is_nan() {
                f64::NAN
            } else {
                wind_direction(*u, *v)
            }
        })
        .collect();

    let mut output = NormalizedOutput::new(means.dimensions.clone());
    output.auxiliary = means.auxiliary.clone();
    output.attributes = means.attributes.clone();
    output.push_variable(VariableMeta::wind_speed(), speed);
    output.push_variable(VariableMeta::wind_direction(), direction);
    output.validate()?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dimension;
    use chrono::NaiveDate;

    fn levelled(levels: Vec<i64>, variables: Vec<(Variable, Vec<f64>)>) -> NormalizedOutput {
        let t0 = NaiveDate::from_ymd_opt(2016, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut output = NormalizedOutput::new(vec![
            Dimension::new(DIM_TIME, CoordinateValues::Time(vec![t0])),
            Dimension::new(DIM_STATION, CoordinateValues::Integer(vec![0])),
            Dimension::new(DIM_LEVEL, CoordinateValues::Integer(levels)),
        ]);
        for (variable, values) in variables {
            output.push_variable(variable.meta(), values);
        }
        output
    }

    #[test]
    fn test_parse() {
        assert_eq!(Recipe::parse("kindex").unwrap(), Recipe::KIndex);
        assert_eq!(Recipe::parse("WIND").unwrap(), Recipe::Wind);
        assert_eq!(
            Recipe::parse("tcwv").unwrap(),
            Recipe::Single(Variable::TotalColumnWaterVapour)
        );
        assert!(matches!(
            Recipe::parse("sst"),
            Err(ProcessingError::Config(_))
        ));
    }

    #[test]
    fn test_levels_for_inputs() {
        assert_eq!(
            Recipe::KIndex.levels_for(Variable::Temperature, None),
            Some(vec![500, 700, 850])
        );
        assert_eq!(
            Recipe::KIndex.levels_for(Variable::RelativeHumidity, Some(&[1000])),
            Some(vec![700, 850])
        );
        assert_eq!(
            Recipe::Single(Variable::Cape).levels_for(Variable::Cape, Some(&[850])),
            None
        );
        assert_eq!(
            Recipe::Single(Variable::Temperature).levels_for(Variable::Temperature, Some(&[850])),
            Some(vec![850])
        );
        assert_eq!(
            Recipe::Wind.levels_for(Variable::UWind, None).map(|l| l.len()),
            Some(8)
        );
    }

    #[test]
    fn test_k_index_from_reassembled_inputs() {
        // levels 500, 700, 850
        let inputs = levelled(
            vec![500, 700, 850],
            vec![
                (Variable::Temperature, vec![263.15, 281.15, 293.15]),
                (Variable::RelativeHumidity, vec![f64::NAN, 70.0, 90.0]),
            ],
        );

        let output = Recipe::KIndex.finish(inputs, false).unwrap();
        assert_eq!(output.dimension_names(), vec!["time", "station"]);
        let k = output.variable("K_index").unwrap().values[0];
        // (20 - -10) + 18 - (8 - 2) = 42
        assert!((k - 42.0).abs() < 1e-9, "k = {}", k);
    }

    #[test]
    fn test_k_index_missing_level_is_nan() {
        let inputs = levelled(
            vec![700, 850],
            vec![
                (Variable::Temperature, vec![281.15, 293.15]),
                (Variable::RelativeHumidity, vec![70.0, 90.0]),
            ],
        );
        let output = Recipe::KIndex.finish(inputs, false).unwrap();
        assert!(output.variable("K_index").unwrap().values[0].is_nan());
    }

    #[test]
    fn test_wind_profile() {
        let inputs = levelled(
            vec![850, 1000],
            vec![
                (Variable::UWind, vec![3.0, 0.0]),
                (Variable::VWind, vec![4.0, f64::NAN]),
            ],
        );

        let output = Recipe::Wind.finish(inputs, false).unwrap();
        assert_eq!(output.dimension_names(), vec!["station", "level"]);
        let speed = &output.variable("wind_speed").unwrap().values;
        let direction = &output.variable("wind_direction").unwrap().values;
        assert!((speed[0] - 5.0).abs() < 1e-12);
        assert!(speed[1].is_nan());
        assert!((0.0..360.0).contains(&direction[0]));
        assert!(direction[1].is_nan());
    }

    #[test]
    fn test_single_time_mean() {
        let inputs = levelled(vec![850], vec![(Variable::Temperature, vec![290.0])]);
        let output = Recipe::Single(Variable::Temperature)
            .finish(inputs, true)
            .unwrap();
        assert_eq!(output.dimension_names(), vec!["station", "level"]);
        assert_eq!(output.variable("t").unwrap().values, vec![290.0]);
    }
}
