pub mod cf;
pub mod locator;
#[cfg(feature = "netcdf")]
pub mod netcdf_volume;
pub mod volume;

pub use cf::{Packing, TimeUnits};
pub use locator::{days_in_month, FileLocator, Granularity};
#[cfg(feature = "netcdf")]
pub use netcdf_volume::{NetcdfSource, NetcdfVolume};
pub use volume::{GridAxes, GridIndex, GridVolume, MemorySource, MemoryVolume, VolumeSource};

/// The volume source compiled into this build, if any.
pub fn default_source() -> crate::error::Result<Box<dyn VolumeSource>> {
    #[cfg(feature = "netcdf")]
    {
        Ok(Box::new(NetcdfSource))
    }
    #[cfg(not(feature = "netcdf"))]
    {
        Err(crate::error::ProcessingError::Config(
            "built without NetCDF support; rebuild with `--features netcdf`".to_string(),
        ))
    }
}
