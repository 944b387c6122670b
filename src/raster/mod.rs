mod align;
mod crs;
mod geotiff;
mod layer;
mod mask;
mod transform;

pub use align::align_to;
pub use crs::{Crs, Reprojector};
pub use geotiff::{read_geotiff, write_geotiff};
pub use layer::Raster;
pub use mask::{binarize, population_exposure};
pub use transform::GeoTransform;
