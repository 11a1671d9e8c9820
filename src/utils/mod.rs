pub mod constants;
pub mod coordinates;
pub mod filename;
pub mod progress;

pub use constants::*;
pub use coordinates::{normalize_longitude, parse_decimal_degrees, LongitudeConvention};
pub use filename::{default_grid_filename, mode_token, report_filename, table_filename};
pub use progress::ProgressReporter;
