/// Archive naming
pub const DEFAULT_PRODUCT: &str = "era5_oper";
pub const SINGLE_LEVEL_KIND: &str = "sfc";
pub const PRESSURE_LEVEL_KIND: &str = "pl";

/// Default archive roots (NCI rt52 layout)
pub const DEFAULT_SINGLE_LEVEL_ROOT: &str = "/g/data/rt52/era5/single-levels/reanalysis";
pub const DEFAULT_PRESSURE_LEVEL_ROOT: &str = "/g/data/rt52/era5/pressure-levels/reanalysis";

/// Default study period
pub const DEFAULT_START_YEAR: i32 = 2015;
pub const DEFAULT_END_YEAR: i32 = 2023;

/// Station catalog columns
pub const COLUMN_LATITUDE: &str = "latitude";
pub const COLUMN_LONGITUDE: &str = "longitude";
pub const COLUMN_DATE: &str = "date";

/// Pressure levels (hPa)
pub const K_INDEX_TEMPERATURE_LEVELS: [i32; 3] = [500, 700, 850];
pub const K_INDEX_HUMIDITY_LEVELS: [i32; 2] = [700, 850];
pub const WIND_PROFILE_LEVELS: [i32; 8] = [100, 200, 300, 500, 700, 850, 925, 1000];
pub const LEVEL_MATCH_TOLERANCE: f64 = 0.5;

/// Unit conversion
pub const ZERO_CELSIUS_IN_KELVIN: f64 = 273.15;

/// Processing defaults
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;
pub const STATIONS_SUBDIR: &str = "stations";

/// Output metadata keys
pub const META_DIMENSIONS: &str = "grid:dimensions";
pub const META_AUXILIARY: &str = "grid:auxiliary";
pub const META_ATTRIBUTES: &str = "grid:attributes";
pub const META_UNITS: &str = "units";
pub const META_DESCRIPTION: &str = "description";

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
