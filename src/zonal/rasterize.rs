use std::ops::Range;

use geo::{BoundingRect, Contains, Coord, Intersects, LineString, MultiPolygon, Point, Polygon};
use ndarray::Array2;

use crate::raster::GeoTransform;

/// Cells selected by a polygon, as a boolean mask over the grid window
/// covering the polygon's bounding box.
pub(super) struct CellMask {
    rows: Range<usize>,
    cols: Range<usize>,
    mask: Array2<bool>,
}

impl CellMask {
    fn new(rows: Range<usize>, cols: Range<usize>) -> Self {
        let mask = Array2::from_elem((rows.len(), cols.len()), false);
        Self { rows, cols, mask }
    }

    fn empty() -> Self { Self::new(0..0, 0..0) }

    fn select(&mut self, row: usize, col: usize) {
        self.mask[(row - self.rows.start, col - self.cols.start)] = true;
    }

    /// Grid rows and columns spanned by the mask.
    #[inline] pub(super) fn window(&self) -> (Range<usize>, Range<usize>) { (self.rows.clone(), self.cols.clone()) }

    /// Selection flags, indexed relative to [`CellMask::window`].
    #[inline] pub(super) fn mask(&self) -> &Array2<bool> { &self.mask }

    #[cfg(test)]
    fn count(&self) -> usize { self.mask.iter().filter(|&&m| m).count() }

    #[cfg(test)]
    fn contains(&self, row: usize, col: usize) -> bool {
        self.rows.contains(&row) && self.cols.contains(&col)
            && self.mask[(row - self.rows.start, col - self.cols.start)]
    }

    #[cfg(test)]
    fn cells(&self) -> Vec<(usize, usize)> {
        self.mask.indexed_iter()
            .filter(|&(_, &m)| m)
            .map(|((r, c), _)| (r + self.rows.start, c + self.cols.start))
            .collect()
    }
}

/// Grid cells selected by a polygon on a `rows` x `cols` grid.
///
/// Default selection keeps cells whose centre lies inside the polygon (even-odd
/// rule, holes excluded). With `all_touched` every cell the polygon intersects
/// is kept. Parts of a multipolygon are OR-ed into one mask.
pub(super) fn cells_in(
    shape: &MultiPolygon<f64>,
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    all_touched: bool,
) -> CellMask {
    let Some((row_range, col_range)) = window(shape, transform, rows, cols) else {
        return CellMask::empty()
    };
    let mut cells = CellMask::new(row_range, col_range);

    if all_touched {
        touched_cells(shape, transform, &mut cells);
    } else if transform.is_axis_aligned() {
        scanline_cells(shape, transform, &mut cells);
    } else {
        centre_cells(shape, transform, &mut cells);
    }
    cells
}

/// Pixel window covering the polygon's bounding box, clipped to the grid.
fn window(
    shape: &MultiPolygon<f64>,
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
) -> Option<(Range<usize>, Range<usize>)> {
    let bbox = shape.bounding_rect()?;
    let corners = [
        transform.to_pixel(bbox.min().x, bbox.min().y),
        transform.to_pixel(bbox.min().x, bbox.max().y),
        transform.to_pixel(bbox.max().x, bbox.min().y),
        transform.to_pixel(bbox.max().x, bbox.max().y),
    ];
    if corners.iter().any(|(c, r)| c.is_nan() || r.is_nan()) { return None }

    let (c0, r0, c1, r1) = corners.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(c0, r0, c1, r1), &(c, r)| (c0.min(c), r0.min(r), c1.max(c), r1.max(r)),
    );

    let clip = |lo: f64, hi: f64, n: usize| -> Option<Range<usize>> {
        let lo = lo.floor().max(0.0);
        let hi = hi.ceil().min(n as f64);
        (lo < hi).then(|| lo as usize..hi as usize)
    };

    Some((clip(r0, r1, rows)?, clip(c0, c1, cols)?))
}

/// Centre-of-pixel rasterization for north-up (or south-up) grids.
///
/// For each row, the horizontal line through the cell centres is intersected
/// with every ring; sorted crossings pair up into inside spans.
fn scanline_cells(shape: &MultiPolygon<f64>, transform: &GeoTransform, cells: &mut CellMask) {
    let (rows, cols) = cells.window();

    for polygon in shape {
        let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
        let edges = rings.flat_map(|ring| ring.lines()).collect::<Vec<_>>();

        for row in rows.clone() {
            let (_, y) = transform.pixel_center(0, row);

            // Half-open test so a vertex on the scanline is counted once.
            let mut xs = edges.iter()
                .filter(|e| (e.start.y <= y && y < e.end.y) || (e.end.y <= y && y < e.start.y))
                .map(|e| e.start.x + (y - e.start.y) * (e.end.x - e.start.x) / (e.end.y - e.start.y))
                .collect::<Vec<_>>();
            xs.sort_by(f64::total_cmp);

            for span in xs.chunks_exact(2) {
                let (a, _) = transform.to_pixel(span[0], y);
                let (b, _) = transform.to_pixel(span[1], y);
                let (a, b) = (a.min(b), a.max(b));

                // Column c is inside when its centre c + 0.5 lies in [a, b).
                let start = ((a - 0.5).ceil().max(0.0) as usize).max(cols.start);
                let end = ((b - 0.5).ceil().max(0.0) as usize).min(cols.end);
                for col in start..end {
                    cells.select(row, col);
                }
            }
        }
    }
}

/// Centre-of-pixel selection by point-in-polygon, for rotated grids.
fn centre_cells(shape: &MultiPolygon<f64>, transform: &GeoTransform, cells: &mut CellMask) {
    let (rows, cols) = cells.window();
    for row in rows {
        for col in cols.clone() {
            let (x, y) = transform.pixel_center(col, row);
            if shape.contains(&Point::new(x, y)) {
                cells.select(row, col);
            }
        }
    }
}

/// Every cell whose footprint intersects the polygon.
fn touched_cells(shape: &MultiPolygon<f64>, transform: &GeoTransform, cells: &mut CellMask) {
    let (rows, cols) = cells.window();
    for row in rows {
        for col in cols.clone() {
            if shape.intersects(&cell_polygon(transform, row, col)) {
                cells.select(row, col);
            }
        }
    }
}

fn cell_polygon(transform: &GeoTransform, row: usize, col: usize) -> Polygon<f64> {
    let corner = |c: usize, r: usize| {
        let (x, y) = transform.pixel_corner(c, r);
        Coord { x, y }
    };
    Polygon::new(
        LineString::from(vec![
            corner(col, row),
            corner(col + 1, row),
            corner(col + 1, row + 1),
            corner(col, row + 1),
            corner(col, row),
        ]),
        vec![],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn unit_grid() -> GeoTransform { GeoTransform::new(0.0, 4.0, 1.0, -1.0) }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0),
        ]])
    }

    #[test]
    fn covering_square_selects_every_cell() {
        let cells = cells_in(&square(0.0, 0.0, 4.0, 4.0), &unit_grid(), 4, 4, false);
        assert_eq!(cells.count(), 16);
    }

    #[test]
    fn centres_decide_membership() {
        // Covers the centres (0.5, 3.5) and (1.5, 3.5) only.
        let cells = cells_in(&square(0.2, 3.2, 1.8, 3.9), &unit_grid(), 4, 4, false);
        assert_eq!(cells.cells(), vec![(0, 0), (0, 1)]);
    }

    #[test]
    fn small_polygon_misses_centres_but_touches() {
        let shape = square(0.1, 3.1, 0.4, 3.4);
        assert_eq!(cells_in(&shape, &unit_grid(), 4, 4, false).count(), 0);
        assert_eq!(cells_in(&shape, &unit_grid(), 4, 4, true).cells(), vec![(0, 0)]);
    }

    #[test]
    fn holes_are_excluded() {
        let shape = MultiPolygon(vec![polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 3.0, y: 0.0), (x: 3.0, y: 3.0), (x: 0.0, y: 3.0), (x: 0.0, y: 0.0)],
            interiors: [[(x: 1.0, y: 1.0), (x: 2.0, y: 1.0), (x: 2.0, y: 2.0), (x: 1.0, y: 2.0), (x: 1.0, y: 1.0)]],
        )]);
        let transform = GeoTransform::new(0.0, 3.0, 1.0, -1.0);
        let cells = cells_in(&shape, &transform, 3, 3, false);
        assert_eq!(cells.count(), 8);
        assert!(!cells.contains(1, 1));
    }

    #[test]
    fn polygon_outside_grid_selects_nothing() {
        let cells = cells_in(&square(10.0, 10.0, 12.0, 12.0), &unit_grid(), 4, 4, true);
        assert_eq!(cells.count(), 0);
        assert_eq!(cells.mask().len(), 0);
    }

    #[test]
    fn rotated_grid_uses_point_tests() {
        let transform = GeoTransform::from_gdal([0.0, 1.0, 0.001, 4.0, 0.001, -1.0]);
        let cells = cells_in(&square(-1.0, -1.0, 5.0, 5.0), &transform, 4, 4, false);
        assert_eq!(cells.count(), 16);
    }

    #[test]
    fn mask_covers_only_the_polygon_window() {
        // A 1x1 polygon on a large grid allocates a 1x1 mask, not the grid.
        let transform = GeoTransform::new(0.0, 1000.0, 1.0, -1.0);
        let cells = cells_in(&square(500.0, 500.0, 501.0, 501.0), &transform, 1000, 1000, false);
        assert_eq!(cells.mask().dim(), (1, 1));
        assert_eq!(cells.cells(), vec![(499, 500)]);
    }

    #[test]
    fn overlapping_parts_select_a_cell_once() {
        let shape = MultiPolygon(vec![
            square(0.0, 3.0, 2.0, 4.0).0.remove(0),
            square(1.0, 3.0, 3.0, 4.0).0.remove(0),
        ]);
        let cells = cells_in(&shape, &unit_grid(), 4, 4, false);
        assert_eq!(cells.cells(), vec![(0, 0), (0, 1), (0, 2)]);
    }
}
