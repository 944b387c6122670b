//! Per-hazard processors. Each one returns the admin table extended with its
//! metric columns, one row per region in admin order.

mod coastal;
mod cyclone;
mod deforestation;
mod exposure;

use anyhow::{Context, Result};
use geo::MultiPolygon;
use polars::prelude::*;
use tracing::warn;

use crate::{raster::{read_geotiff, Raster}, storage::ObjectStore, vector::AdminLayer};

pub use coastal::coastal_erosion;
pub use cyclone::cyclone;
pub use deforestation::deforestation;
pub use exposure::{exposure_raster, exposure_table};

/// `num / den` per row; null when either side is null or the denominator is 0.
pub fn ratio(num: &[Option<f64>], den: &[Option<f64>]) -> Vec<Option<f64>> {
    num.iter().zip(den)
        .map(|(&n, &d)| match (n, d) {
            (Some(n), Some(d)) if d != 0.0 => Some(n / d),
            _ => None,
        })
        .collect()
}

/// Read and decode a GeoTIFF from the store.
pub fn load_raster(store: &dyn ObjectStore, key: &str) -> Result<Raster> {
    let bytes = store.get(key)?;
    read_geotiff(&bytes)
        .with_context(|| format!("[hazard::load_raster] failed to decode {}", store.locate(key)))
}

/// Admin polygons in the raster's CRS. A raster without CRS is assumed to
/// share the admin layer's coordinates.
fn shapes_for(admin: &AdminLayer, raster: &Raster) -> Result<Vec<MultiPolygon<f64>>> {
    match raster.crs() {
        Some(crs) => admin.shapes_in(crs),
        None => {
            warn!("[hazard] raster has no CRS; using admin coordinates as they are");
            Ok(admin.shapes().to_vec())
        }
    }
}

/// Admin table with `metrics` appended as nullable float columns.
fn with_metrics(admin: &AdminLayer, metrics: Vec<(&str, Vec<Option<f64>>)>) -> Result<DataFrame> {
    let columns = metrics.into_iter()
        .map(|(name, values)| Column::new(name.into(), values))
        .collect::<Vec<_>>();
    Ok(admin.data().hstack(&columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_nulls() {
        let num = [Some(60.0), Some(1.0), None, Some(0.0)];
        let den = [Some(100.0), Some(0.0), Some(5.0), None];
        assert_eq!(ratio(&num, &den), vec![Some(0.6), None, None, None]);
    }

    #[test]
    fn zero_numerator_is_a_real_ratio() {
        assert_eq!(ratio(&[Some(0.0)], &[Some(4.0)]), vec![Some(0.0)]);
    }
}
