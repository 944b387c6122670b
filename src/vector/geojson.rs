use anyhow::{Context, Result, anyhow, bail};
use geo::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde_json::{Map, Value};

use crate::{error::HazardError, raster::Crs};
use super::{Feature, VectorLayer};

/// Read a GeoJSON FeatureCollection (or single Feature).
///
/// Coordinates are taken as WGS84 unless a legacy `crs` member names an EPSG code.
pub fn read_geojson(bytes: &[u8]) -> Result<VectorLayer> {
    let value: Value = serde_json::from_slice(bytes)
        .context("[vector::geojson] failed to parse GeoJSON bytes")?;

    let features = match value["type"].as_str() {
        Some("FeatureCollection") => value["features"].as_array()
            .ok_or_else(|| anyhow!("[vector::geojson] FeatureCollection without features"))?
            .iter()
            .map(parse_feature)
            .collect::<Result<Vec<_>>>()?,
        Some("Feature") => vec![parse_feature(&value)?],
        other => bail!("[vector::geojson] expected a FeatureCollection, found {other:?}"),
    };

    Ok(VectorLayer { features, crs: Some(parse_crs(&value["crs"]).unwrap_or(Crs::WGS84)) })
}

/// EPSG code from a legacy named CRS, e.g. "urn:ogc:def:crs:EPSG::32735" or "EPSG:4326".
fn parse_crs(crs: &Value) -> Option<Crs> {
    let name = crs["properties"]["name"].as_str()?;
    if name.ends_with("CRS84") { return Some(Crs::WGS84) }
    name.rsplit(':').next()?.parse().ok().map(Crs)
}

fn parse_feature(feature: &Value) -> Result<Feature> {
    let properties = feature["properties"].as_object().cloned().unwrap_or_else(Map::new);
    let geometry = match &feature["geometry"] {
        Value::Null => Geometry::MultiPolygon(MultiPolygon(vec![])),
        geometry => parse_geometry(geometry)?,
    };
    Ok(Feature::new(geometry, properties))
}

fn parse_geometry(geometry: &Value) -> Result<Geometry<f64>> {
    let kind = geometry["type"].as_str().unwrap_or_default();
    if kind == "GeometryCollection" {
        let parts = geometry["geometries"].as_array()
            .ok_or_else(|| anyhow!("[vector::geojson] GeometryCollection without geometries"))?
            .iter()
            .map(parse_geometry)
            .collect::<Result<Vec<_>>>()?;
        return Ok(Geometry::GeometryCollection(GeometryCollection(parts)))
    }

    let coords = &geometry["coordinates"];
    Ok(match kind {
        "Point" => Geometry::Point(Point(parse_coord(coords)?)),
        "MultiPoint" => Geometry::MultiPoint(MultiPoint(
            array(coords)?.iter().map(|c| parse_coord(c).map(Point)).collect::<Result<_>>()?
        )),
        "LineString" => Geometry::LineString(parse_line(coords)?),
        "MultiLineString" => Geometry::MultiLineString(MultiLineString(
            array(coords)?.iter().map(parse_line).collect::<Result<_>>()?
        )),
        "Polygon" => Geometry::Polygon(parse_polygon(coords)?),
        "MultiPolygon" => Geometry::MultiPolygon(MultiPolygon(
            array(coords)?.iter().map(parse_polygon).collect::<Result<_>>()?
        )),
        other => return Err(HazardError::UnsupportedGeometry(other.to_string()).into()),
    })
}

fn array(value: &Value) -> Result<&Vec<Value>> {
    value.as_array().ok_or_else(|| anyhow!("[vector::geojson] expected a coordinate array"))
}

fn parse_coord(value: &Value) -> Result<Coord<f64>> {
    let pair = array(value)?;
    let axis = |i: usize| pair.get(i).and_then(Value::as_f64)
        .ok_or_else(|| anyhow!("[vector::geojson] invalid coordinate: {value}"));
    Ok(Coord { x: axis(0)?, y: axis(1)? })
}

fn parse_line(value: &Value) -> Result<LineString<f64>> {
    Ok(LineString(array(value)?.iter().map(parse_coord).collect::<Result<_>>()?))
}

/// Polygon rings: exterior first, then holes. Rings are closed if needed.
fn parse_polygon(value: &Value) -> Result<Polygon<f64>> {
    let mut rings = array(value)?.iter().map(|ring| {
        let mut line = parse_line(ring)?;
        line.close();
        Ok(line)
    }).collect::<Result<Vec<_>>>()?;

    if rings.is_empty() { bail!("[vector::geojson] polygon without exterior ring") }
    let exterior = rings.remove(0);
    Ok(Polygon::new(exterior, rings))
}
