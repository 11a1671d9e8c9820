use crate::archive::Granularity;
use serde::{Deserialize, Serialize};

/// ERA5 variables read straight from the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variable {
    Cape,
    Cin,
    TotalColumnWaterVapour,
    Temperature,
    RelativeHumidity,
    UWind,
    VWind,
}

impl Variable {
    pub const ALL: [Variable; 7] = [
        Variable::Cape,
        Variable::Cin,
        Variable::TotalColumnWaterVapour,
        Variable::Temperature,
        Variable::RelativeHumidity,
        Variable::UWind,
        Variable::VWind,
    ];

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "cape" => Some(Variable::Cape),
            "cin" => Some(Variable::Cin),
            "tcwv" => Some(Variable::TotalColumnWaterVapour),
            "t" => Some(Variable::Temperature),
            "r" => Some(Variable::RelativeHumidity),
            "u" => Some(Variable::UWind),
            "v" => Some(Variable::VWind),
            _ => None,
        }
    }

    /// Short name used both in the archive path and inside the files.
    pub fn code(&self) -> &'static str {
        match self {
            Variable::Cape => "cape",
            Variable::Cin => "cin",
            Variable::TotalColumnWaterVapour => "tcwv",
            Variable::Temperature => "t",
            Variable::RelativeHumidity => "r",
            Variable::UWind => "u",
            Variable::VWind => "v",
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            Variable::Cape | Variable::Cin | Variable::TotalColumnWaterVapour => {
                Granularity::SingleLevel
            }
            Variable::Temperature
            | Variable::RelativeHumidity
            | Variable::UWind
            | Variable::VWind => Granularity::PressureLevel,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Variable::Cape => "Convective available potential energy",
            Variable::Cin => "Convective inhibition",
            Variable::TotalColumnWaterVapour => "Total column water vapour",
            Variable::Temperature => "Temperature",
            Variable::RelativeHumidity => "Relative humidity",
            Variable::UWind => "U component of wind",
            Variable::VWind => "V component of wind",
        }
    }

    pub fn units(&self) -> &'static str {
        match self {
            Variable::Cape | Variable::Cin => "J kg-1",
            Variable::TotalColumnWaterVapour => "kg m-2",
            Variable::Temperature => "K",
            Variable::RelativeHumidity => "%",
            Variable::UWind | Variable::VWind => "m s-1",
        }
    }

    pub fn meta(&self) -> VariableMeta {
        VariableMeta::new(self.code(), self.units(), self.display_name())
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Name and attributes of an output data variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableMeta {
    pub name: String,
    pub units: String,
    pub description: String,
}

impl VariableMeta {
    pub fn new(name: &str, units: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            units: units.to_string(),
            description: description.to_string(),
        }
    }

    pub fn k_index() -> Self {
        Self::new("K_index", "degC", "K-index from 850/700/500 hPa temperature and humidity")
    }

    pub fn wind_speed() -> Self {
        Self::new("wind_speed", "m/s", "Time-averaged wind speed")
    }

    pub fn wind_direction() -> Self {
        Self::new("wind_direction", "degrees", "Time-averaged wind direction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_codes() {
        for variable in Variable::ALL {
            assert_eq!(Variable::from_code(variable.code()), Some(variable));
        }
        assert_eq!(Variable::from_code("xx"), None);
    }

    #[test]
    fn test_variable_granularity() {
        assert_eq!(Variable::Cape.granularity(), Granularity::SingleLevel);
        assert_eq!(
            Variable::TotalColumnWaterVapour.granularity(),
            Granularity::SingleLevel
        );
        assert_eq!(Variable::Temperature.granularity(), Granularity::PressureLevel);
        assert_eq!(Variable::VWind.granularity(), Granularity::PressureLevel);
    }

    #[test]
    fn test_variable_units() {
        assert_eq!(Variable::Cape.units(), "J kg-1");
        assert_eq!(Variable::RelativeHumidity.units(), "%");
        assert_eq!(VariableMeta::k_index().name, "K_index");
    }
}
