use anyhow::{Result, ensure};
use ndarray::Zip;

use crate::error::HazardError;
use super::{Crs, Raster};

/// Binary mask on the same grid: 1 where `value > threshold`, 0 elsewhere.
/// Missing cells count as 0 before the comparison.
pub fn binarize(raster: &Raster, threshold: f64) -> Raster {
    let mask = raster.data().mapv(|v| {
        let v = if raster.is_missing(v) { 0.0 } else { v };
        if v > threshold { 1.0 } else { 0.0 }
    });
    raster.with_data(mask)
}

/// Exposed population: `mask * population` per cell, tagged EPSG:4326.
///
/// A missing population cell yields NaN so that it drops out of zonal sums.
pub fn population_exposure(mask: &Raster, population: &Raster) -> Result<Raster> {
    ensure!(
        mask.shape() == population.shape(),
        HazardError::GridMismatch { expected: population.shape(), found: mask.shape() }
    );
    ensure!(
        mask.transform().approx_eq(population.transform()),
        HazardError::GridMismatch { expected: population.shape(), found: mask.shape() }
    );

    let pop = population.values_nan();
    let product = Zip::from(mask.data()).and(&pop).map_collect(|&m, &p| m * p);

    Ok(population.with_data(product).with_crs(Crs::WGS84))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoTransform;

    fn grid(rows: &[Vec<f64>]) -> Raster {
        Raster::from_rows(rows, GeoTransform::new(0.0, 2.0, 1.0, -1.0), Some(Crs(32735)))
    }

    #[test]
    fn threshold_is_strict() {
        let mask = binarize(&grid(&[vec![0.0, 1.0], vec![0.115, 0.2]]), 0.115);
        assert_eq!(mask.data(), &ndarray::array![[0.0, 1.0], [0.0, 1.0]]);
    }

    #[test]
    fn missing_cells_become_zero() {
        let raster = Raster::new(
            ndarray::array![[f64::NAN, -9999.0], [5.0, 0.0]],
            GeoTransform::default(),
            Some(Crs::WGS84),
            Some(-9999.0),
        );
        // With a negative threshold, a missing cell (treated as 0) would pass.
        let mask = binarize(&raster, -1.0);
        assert_eq!(mask.data(), &ndarray::array![[1.0, 1.0], [1.0, 1.0]]);
        let mask = binarize(&raster, 0.0);
        assert_eq!(mask.data(), &ndarray::array![[0.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn input_is_not_mutated() {
        let raster = grid(&[vec![3.0, 0.0], vec![0.0, 3.0]]);
        let before = raster.clone();
        let _ = binarize(&raster, 1.0);
        assert_eq!(raster, before);
    }

    #[test]
    fn exposure_is_cellwise_product_in_wgs84() {
        let mask = binarize(&grid(&[vec![0.0, 1.0], vec![0.0, 2.0]]), 0.0);
        let pop = grid(&[vec![10.0, 20.0], vec![30.0, 40.0]]);
        let exposure = population_exposure(&mask, &pop).unwrap();
        assert_eq!(exposure.data(), &ndarray::array![[0.0, 20.0], [0.0, 40.0]]);
        assert_eq!(exposure.crs(), Some(Crs::WGS84));
        assert!(exposure.same_grid(&pop));
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let mask = grid(&[vec![1.0, 1.0]]);
        let pop = grid(&[vec![1.0, 1.0], vec![1.0, 1.0]]);
        let err = population_exposure(&mask, &pop).unwrap_err();
        assert!(matches!(err.downcast_ref::<HazardError>(), Some(HazardError::GridMismatch { .. })));
    }
}
