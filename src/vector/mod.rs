//! Vector inputs: administrative boundaries and hazard features.

mod admin;
mod geojson;
mod index;
mod proj;
mod shp;

use anyhow::{Result, bail};
use geo::Geometry;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{raster::Crs, storage::ObjectStore};

pub use admin::{ADMIN_COLUMNS, AdminLayer};
pub use geojson::read_geojson;
pub use index::SpatialIndex;
pub use proj::{reproject_geometry, reproject_shapes};
pub use shp::read_shapefile;

/// One vector feature: a geometry and its attribute map.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry<f64>,
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry<f64>, properties: Map<String, Value>) -> Self {
        Self { geometry, properties }
    }

    /// Numeric attribute, accepting numbers and numeric strings.
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.properties.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Features read from one source, with the CRS they are expressed in.
#[derive(Debug, Clone, Default)]
pub struct VectorLayer {
    pub features: Vec<Feature>,
    pub crs: Option<Crs>,
}

impl VectorLayer {
    #[inline] pub fn len(&self) -> usize { self.features.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.features.is_empty() }
}

/// Read a vector layer from `key`, choosing the format by extension.
pub fn read_vector(store: &dyn ObjectStore, key: &str) -> Result<VectorLayer> {
    let ext = key.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    let layer = match ext.as_str() {
        "geojson" | "json" => read_geojson(&store.get(key)?)?,
        "shp" => read_shapefile(store, key)?,
        _ => bail!("[vector::read_vector] unsupported vector format: {key}"),
    };

    debug!(path = %store.locate(key), features = layer.len(), crs = ?layer.crs, "[vector] read layer");
    Ok(layer)
}
