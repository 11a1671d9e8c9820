pub mod output;
pub mod query;
pub mod station;
pub mod variable;

pub use output::{
    AuxiliaryCoordinate, CoordinateValues, DataVariable, Dimension, NormalizedOutput, DIM_LEVEL,
    DIM_STATION, DIM_TIME,
};
pub use query::{ExtractedSlice, ExtractionQuery, Sample, TimeSelection};
pub use station::{Station, StationCatalog, StationId};
pub use variable::{Variable, VariableMeta};
