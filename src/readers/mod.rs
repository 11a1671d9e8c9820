pub mod station_reader;

pub use station_reader::{parse_event_time, StationReader};
