use std::path::Path;

use anyhow::{Context, Result};
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde_json::{Map, Number, Value};
use shapefile::{dbase::{FieldValue, Record}, Reader, Shape};

use crate::{error::HazardError, raster::Crs, storage::ObjectStore};
use super::{Feature, VectorLayer};

const REQUIRED_SIDECARS: [&str; 2] = ["shx", "dbf"];
const OPTIONAL_SIDECARS: [&str; 2] = ["prj", "cpg"];

/// Read a shapefile from a store.
///
/// The `.shp` and its sidecars are staged into a temporary directory so the
/// reader can open them by path.
pub fn read_shapefile(store: &dyn ObjectStore, key: &str) -> Result<VectorLayer> {
    let stem = key.strip_suffix(".shp").unwrap_or(key);
    let staging = tempfile::tempdir()
        .context("[vector::shp] failed to create staging directory")?;
    let local = staging.path().join("layer.shp");

    stage(&local, &store.get(key)?)?;
    for ext in REQUIRED_SIDECARS {
        let bytes = store.get(&format!("{stem}.{ext}"))?;
        stage(&local.with_extension(ext), &bytes)?;
    }
    for ext in OPTIONAL_SIDECARS {
        let sidecar = format!("{stem}.{ext}");
        if store.has(&sidecar) {
            stage(&local.with_extension(ext), &store.get(&sidecar)?)?;
        }
    }

    read_shapefile_path(&local)
}

fn stage(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes)
        .with_context(|| format!("[vector::shp] failed to stage {}", path.display()))
}

/// Read every shape and attribute record from a `.shp` on disk.
pub(crate) fn read_shapefile_path(path: &Path) -> Result<VectorLayer> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("[vector::shp] failed to open shapefile: {}", path.display()))?;

    let mut features = Vec::with_capacity(reader.shape_count()?);
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.context("[vector::shp] error reading shape+record")?;
        features.push(Feature::new(shape_to_geometry(shape)?, record_to_properties(record)));
    }

    let crs = std::fs::read_to_string(path.with_extension("prj")).ok()
        .and_then(|wkt| crs_from_wkt(&wkt));

    Ok(VectorLayer { features, crs })
}

fn shape_to_geometry(shape: Shape) -> Result<Geometry<f64>> {
    let coord = |p: &shapefile::Point| Coord { x: p.x, y: p.y };
    Ok(match shape {
        Shape::NullShape => Geometry::MultiPolygon(MultiPolygon(vec![])),
        Shape::Point(p) => Geometry::Point(Point(coord(&p))),
        Shape::Multipoint(mp) => Geometry::MultiPoint(MultiPoint(
            mp.points().iter().map(|p| Point(coord(p))).collect()
        )),
        Shape::Polyline(line) => Geometry::MultiLineString(MultiLineString(
            line.parts().iter().map(|part| LineString(part.iter().map(coord).collect())).collect()
        )),
        Shape::Polygon(polygon) => Geometry::MultiPolygon(rings_to_multipolygon(
            polygon.rings().iter().map(|ring| ring.points().iter().map(coord).collect())
        )),
        other => return Err(HazardError::UnsupportedGeometry(format!("{:?}", other.shapetype())).into()),
    })
}

/// Group shapefile rings into polygons: each clockwise (negative area) ring
/// opens a polygon and the counter-clockwise rings after it are its holes.
fn rings_to_multipolygon(rings: impl Iterator<Item = Vec<Coord<f64>>>) -> MultiPolygon<f64> {
    fn signed_area(pts: &[Coord<f64>]) -> f64 {
        pts.windows(2).map(|w| w[0].x * w[1].y - w[1].x * w[0].y).sum::<f64>() / 2.0
    }

    let mut polygons = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes = Vec::new();

    for coords in rings {
        let mut ring = LineString(coords);
        ring.close();
        if signed_area(&ring.0) < 0.0 {
            if let Some(ext) = exterior.replace(ring) {
                polygons.push(Polygon::new(ext, std::mem::take(&mut holes)));
            }
        } else {
            holes.push(ring);
        }
    }
    if let Some(ext) = exterior {
        polygons.push(Polygon::new(ext, holes));
    }

    MultiPolygon(polygons)
}

/// dBase attributes as JSON values; whole numbers become integers.
fn record_to_properties(record: Record) -> Map<String, Value> {
    fn number(n: f64) -> Value {
        if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
            Value::from(n as i64)
        } else {
            Number::from_f64(n).map_or(Value::Null, Value::Number)
        }
    }

    record.into_iter()
        .map(|(field, value)| {
            let value = match value {
                FieldValue::Character(Some(s)) => Value::String(s.trim().to_string()),
                FieldValue::Memo(s) => Value::String(s),
                FieldValue::Numeric(Some(n)) => number(n),
                FieldValue::Float(Some(f)) => number(f64::from(f)),
                FieldValue::Double(d) => number(d),
                FieldValue::Currency(c) => number(c),
                FieldValue::Integer(i) => Value::from(i),
                FieldValue::Logical(Some(b)) => Value::Bool(b),
                _ => Value::Null,
            };
            (field, value)
        })
        .collect()
}

/// EPSG code from a `.prj` WKT: WGS84 UTM zones by name, else geographic WGS84.
fn crs_from_wkt(wkt: &str) -> Option<Crs> {
    let upper = wkt.to_ascii_uppercase();
    if !upper.contains("PROJCS") {
        return upper.contains("GEOGCS").then_some(Crs::WGS84)
    }

    // e.g. PROJCS["WGS_1984_UTM_Zone_35S", ...] or "WGS 84 / UTM zone 35S"
    let (_, rest) = upper.split_once("UTM")?;
    let rest = rest.trim_start_matches(|c: char| !c.is_ascii_digit());
    let digits = rest.chars().take_while(char::is_ascii_digit).collect::<String>();
    let zone: u32 = digits.parse().ok().filter(|z| (1..=60).contains(z))?;
    let south = rest[digits.len()..].starts_with('S');
    Some(Crs(if south { 32700 + zone } else { 32600 + zone }))
}
