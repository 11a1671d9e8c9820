pub mod grid_writer;
pub mod station_writer;
pub mod table_writer;

pub use grid_writer::{grid_info, parse_compression, read_grid, GridFileInfo, GridWriter};
pub use station_writer::StationWriter;
pub use table_writer::TableWriter;
