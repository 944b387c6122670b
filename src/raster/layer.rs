use ndarray::Array2;

use super::{Crs, GeoTransform};

/// A single-band raster: cell values, georeferencing, and an optional no-data sentinel.
///
/// NaN is always treated as missing, whether or not a sentinel is set.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    data: Array2<f64>,
    transform: GeoTransform,
    crs: Option<Crs>,
    nodata: Option<f64>,
}

impl Raster {
    pub fn new(data: Array2<f64>, transform: GeoTransform, crs: Option<Crs>, nodata: Option<f64>) -> Self {
        Self { data, transform, crs, nodata }
    }

    /// Build from nested rows; convenient for small grids.
    pub fn from_rows(rows: &[Vec<f64>], transform: GeoTransform, crs: Option<Crs>) -> Self {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        let data = Array2::from_shape_fn((height, width), |(r, c)| {
            rows[r].get(c).copied().unwrap_or(f64::NAN)
        });
        Self::new(data, transform, crs, None)
    }

    #[inline] pub fn data(&self) -> &Array2<f64> { &self.data }
    #[inline] pub fn transform(&self) -> &GeoTransform { &self.transform }
    #[inline] pub fn crs(&self) -> Option<Crs> { self.crs }
    #[inline] pub fn nodata(&self) -> Option<f64> { self.nodata }

    /// Grid shape as (rows, cols).
    #[inline] pub fn shape(&self) -> (usize, usize) { self.data.dim() }

    #[inline] pub fn rows(&self) -> usize { self.data.nrows() }
    #[inline] pub fn cols(&self) -> usize { self.data.ncols() }

    /// Value at (row, col), or `None` when the cell is missing or out of range.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.data.get((row, col)).copied().filter(|&v| !self.is_missing(v))
    }

    /// True for NaN and for the no-data sentinel.
    #[inline]
    pub fn is_missing(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nd| value == nd)
    }

    /// New raster on the same grid (transform and CRS) carrying `data`.
    /// Missing cells in `data` are expected to be NaN.
    pub fn with_data(&self, data: Array2<f64>) -> Raster {
        Raster { data, transform: self.transform, crs: self.crs, nodata: None }
    }

    /// Same raster tagged with a different CRS; values are untouched.
    pub fn with_crs(self, crs: Crs) -> Raster {
        Raster { crs: Some(crs), ..self }
    }

    /// True when both rasters have the same shape and transform.
    pub fn same_grid(&self, other: &Raster) -> bool {
        self.shape() == other.shape() && self.transform.approx_eq(&other.transform)
    }

    /// Copy of the values with every missing cell replaced by NaN.
    pub fn values_nan(&self) -> Array2<f64> {
        self.data.mapv(|v| if self.is_missing(v) { f64::NAN } else { v })
    }
}
