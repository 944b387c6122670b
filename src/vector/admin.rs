use anyhow::{Context, Result, bail};
use geo::{BoundingRect, Coord, Geometry, MultiPolygon, Rect};
use polars::prelude::*;
use serde_json::Value;
use tracing::{info, warn};

use crate::{error::HazardError, raster::{Crs, Reprojector}, storage::ObjectStore};
use super::{VectorLayer, read_vector, reproject_shapes};

/// Admin identifier and name columns, in hierarchy order.
pub const ADMIN_COLUMNS: [&str; 6] = ["adm0_src", "adm0_name", "adm1_src", "adm1_name", "adm2_src", "adm2_name"];

/// Id columns from finest to coarsest.
const ID_COLUMNS: [&str; 3] = ["adm2_src", "adm1_src", "adm0_src"];

/// Administrative regions: attribute table plus one polygon per row.
///
/// `data` holds the present subset of [`ADMIN_COLUMNS`] as nullable strings;
/// row `i` of `data` describes `shapes[i]`.
#[derive(Debug, Clone)]
pub struct AdminLayer {
    data: DataFrame,
    shapes: Vec<MultiPolygon<f64>>,
    crs: Option<Crs>,
}

impl AdminLayer {
    /// Load admin boundaries from a GeoJSON or shapefile key.
    pub fn load(store: &dyn ObjectStore, key: &str) -> Result<Self> {
        let layer = read_vector(store, key)
            .with_context(|| format!("[vector::admin] failed to read admin boundaries {key}"))?;
        let admin = Self::from_layer(layer)?;

        info!(path = %store.locate(key), rows = admin.len(), columns = ?admin.columns(), "[admin] loaded regions");
        Ok(admin)
    }

    /// Build from features whose geometries are polygons.
    pub fn from_layer(layer: VectorLayer) -> Result<Self> {
        let present = ADMIN_COLUMNS.iter()
            .filter(|name| layer.features.iter().any(|f| f.properties.contains_key(**name)))
            .collect::<Vec<_>>();
        if present.is_empty() {
            bail!("[vector::admin] none of the admin columns {ADMIN_COLUMNS:?} are present");
        }

        let columns = present.iter()
            .map(|&&name| Column::new(
                name.into(),
                layer.features.iter()
                    .map(|f| f.properties.get(name).and_then(attribute_string))
                    .collect::<Vec<Option<String>>>(),
            ))
            .collect::<Vec<_>>();

        let shapes = layer.features.into_iter()
            .map(|f| match f.geometry {
                Geometry::Polygon(p) => Ok(MultiPolygon(vec![p])),
                Geometry::MultiPolygon(mp) => Ok(mp),
                _ => Err(HazardError::UnsupportedGeometry("admin region is not a polygon".into()).into()),
            })
            .collect::<Result<Vec<_>>>()?;

        if layer.crs.is_none() {
            warn!("[admin] boundaries carry no CRS; assuming they match each raster");
        }

        Ok(Self { data: DataFrame::new(columns)?, shapes, crs: layer.crs })
    }

    #[inline] pub fn len(&self) -> usize { self.shapes.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.shapes.is_empty() }

    /// Attribute table, one row per region.
    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    #[inline] pub fn crs(&self) -> Option<Crs> { self.crs }

    /// Names of the admin columns present, in hierarchy order.
    pub fn columns(&self) -> Vec<&str> {
        self.data.get_column_names().into_iter().map(|name| name.as_str()).collect()
    }

    /// Finest-grained id column present: adm2, else adm1, else adm0.
    pub fn finest_id(&self) -> Option<&'static str> {
        ID_COLUMNS.into_iter().find(|name| self.data.column(name).is_ok())
    }

    /// Region polygons expressed in `crs`. Boundaries without a CRS are
    /// returned as they are.
    pub fn shapes_in(&self, crs: Crs) -> Result<Vec<MultiPolygon<f64>>> {
        match self.crs {
            Some(from) => reproject_shapes(&self.shapes, from, crs),
            None => Ok(self.shapes.clone()),
        }
    }

    /// Envelope of all regions, in the layer's own CRS.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.shapes.iter()
            .filter_map(|shape| shape.bounding_rect())
            .reduce(|a, b| Rect::new(
                Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            ))
    }

    /// WGS84 UTM zone containing the centre of the layer.
    pub fn utm_crs(&self) -> Result<Crs> {
        let crs = self.crs.ok_or_else(|| HazardError::UndefinedCrs("admin boundaries".into()))?;
        let center = self.bounds()
            .ok_or_else(|| HazardError::UnsupportedGeometry("admin layer has no extent".into()))?
            .center();
        let (lon, lat) = Reprojector::new(crs, Crs::WGS84)?.apply(center.x, center.y)?;
        Ok(Crs::utm_for(lon, lat))
    }
}

/// Attribute value as text; ids may be stored as numbers.
fn attribute_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
