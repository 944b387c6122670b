use anyhow::{Result, ensure};
use ndarray::Array2;
use tracing::debug;

use crate::error::HazardError;
use super::{Raster, Reprojector};

/// Resample `source` onto the grid of `target` by nearest neighbour.
///
/// Each target cell centre is reprojected into the source CRS and takes the
/// value of the source cell it lands in. Centres falling outside the source,
/// or on a missing source cell, become NaN. The result carries the target's
/// transform and CRS and has no sentinel.
pub fn align_to(source: &Raster, target: &Raster) -> Result<Raster> {
    let src_crs = source.crs()
        .ok_or_else(|| HazardError::UndefinedCrs("source raster".into()))?;
    let dst_crs = target.crs()
        .ok_or_else(|| HazardError::UndefinedCrs("target raster".into()))?;

    if src_crs == dst_crs && source.same_grid(target) {
        return Ok(target.with_data(source.values_nan()));
    }

    let reproject = Reprojector::new(dst_crs, src_crs)?;
    let (src_rows, src_cols) = source.shape();
    let src_transform = source.transform();
    let dst_transform = target.transform();

    let mut inside = 0usize;
    let data = Array2::from_shape_fn(target.shape(), |(row, col)| {
        let (x, y) = dst_transform.pixel_center(col, row);
        let Ok((sx, sy)) = reproject.apply(x, y) else { return f64::NAN };

        let (fc, fr) = src_transform.to_pixel(sx, sy);
        if !(fc >= 0.0 && fr >= 0.0) { return f64::NAN }
        let (c, r) = (fc.floor() as usize, fr.floor() as usize);
        if c >= src_cols || r >= src_rows { return f64::NAN }

        inside += 1;
        source.get(r, c).unwrap_or(f64::NAN)
    });

    ensure!(inside > 0, HazardError::DisjointExtent);
    debug!(from = %src_crs, to = %dst_crs, inside, "[raster::align] resampled onto target grid");

    Ok(target.with_data(data))
}
