#![doc = "Hazard-exposure indicators per administrative region"]
pub mod config;
pub mod error;
pub mod export;
pub mod hazard;
pub mod pipeline;
pub mod raster;
pub mod storage;
pub mod vector;
pub mod zonal;

#[doc(inline)]
pub use config::{BufferPolicy, Config, ExposureHazard, StorageConfig};

#[doc(inline)]
pub use error::HazardError;

#[doc(inline)]
pub use pipeline::{HazardOutcome, HazardStatus, Pipeline, RunReport};

#[doc(inline)]
pub use raster::{Crs, GeoTransform, Raster};

#[doc(inline)]
pub use storage::{LocalStore, ObjectStore};

#[doc(inline)]
pub use vector::AdminLayer;
