use anyhow::Result;
use geo::{Coord, Geometry, MapCoords, MultiPolygon};

use crate::raster::{Crs, Reprojector};

/// Transform a geometry's coordinates from one CRS to another.
pub fn reproject_geometry(geom: &Geometry<f64>, reprojector: &Reprojector) -> Result<Geometry<f64>> {
    if reprojector.is_identity() { return Ok(geom.clone()) }
    geom.try_map_coords(|c: Coord<f64>| -> Result<Coord<f64>> {
        let (x, y) = reprojector.apply(c.x, c.y)?;
        Ok(Coord { x, y })
    })
}

/// Reproject a set of polygons, e.g. admin boundaries from lon/lat to UTM metres.
pub fn reproject_shapes(shapes: &[MultiPolygon<f64>], from: Crs, to: Crs) -> Result<Vec<MultiPolygon<f64>>> {
    let reprojector = Reprojector::new(from, to)?;
    if reprojector.is_identity() { return Ok(shapes.to_vec()) }

    shapes.iter()
        .map(|shape| shape.try_map_coords(|c: Coord<f64>| -> Result<Coord<f64>> {
            let (x, y) = reprojector.apply(c.x, c.y)?;
            Ok(Coord { x, y })
        }))
        .collect()
}
