use serde::{Deserialize, Serialize};

/// Affine mapping between pixel (col, row) and map (x, y) coordinates.
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// North-up grids have zero rotation and a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// North-up transform with no rotation.
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Build from GDAL ordering `[origin_x, pixel_width, row_rot, origin_y, col_rot, pixel_height]`.
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Map coordinates of the centre of pixel (col, row).
    #[inline]
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Map coordinates of the top-left corner of pixel (col, row).
    #[inline]
    pub fn pixel_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64, row as f64)
    }

    /// Map coordinates of a fractional pixel position.
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// Fractional pixel position of a map coordinate, or NaN for a degenerate transform.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        (
            (self.pixel_height * dx - self.row_rotation * dy) / det,
            (-self.col_rotation * dx + self.pixel_width * dy) / det,
        )
    }

    /// True when the grid has no rotation terms.
    pub fn is_axis_aligned(&self) -> bool {
        self.row_rotation.abs() < 1e-12 && self.col_rotation.abs() < 1e-12
    }

    /// Compare coefficients within a tolerance scaled to the pixel size.
    pub fn approx_eq(&self, other: &GeoTransform) -> bool {
        let tol = self.pixel_width.abs().max(self.pixel_height.abs()) * 1e-6;
        self.to_gdal().iter()
            .zip(other.to_gdal().iter())
            .all(|(a, b)| (a - b).abs() <= tol)
    }
}

impl Default for GeoTransform {
    fn default() -> Self { Self::new(0.0, 0.0, 1.0, -1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pixel_center_is_half_a_cell_in() {
        let gt = GeoTransform::new(10.0, 20.0, 2.0, -2.0);
        let (x, y) = gt.pixel_center(0, 0);
        assert_relative_eq!(x, 11.0);
        assert_relative_eq!(y, 19.0);
    }

    #[test]
    fn to_pixel_inverts_apply() {
        let gt = GeoTransform::from_gdal([100.0, 0.5, 0.1, 50.0, 0.05, -0.5]);
        let (x, y) = gt.apply(3.25, 7.75);
        let (col, row) = gt.to_pixel(x, y);
        assert_relative_eq!(col, 3.25, epsilon = 1e-9);
        assert_relative_eq!(row, 7.75, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_transform_yields_nan() {
        let gt = GeoTransform::new(0.0, 0.0, 0.0, 0.0);
        let (col, row) = gt.to_pixel(1.0, 1.0);
        assert!(col.is_nan() && row.is_nan());
    }

    #[test]
    fn gdal_round_trip_preserves_layout() {
        let coeffs = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(GeoTransform::from_gdal(coeffs).to_gdal(), coeffs);
    }
}
