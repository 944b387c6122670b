use std::fmt;

use anyhow::{Context, Result};
use proj4rs::{proj::Proj as Proj4, transform::transform};
use serde::{Deserialize, Serialize};

use crate::error::HazardError;

/// Coordinate reference system identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs(pub u32);

impl Crs {
    /// WGS84 lon/lat, the CRS every exposure raster is tagged with.
    pub const WGS84: Crs = Crs(4326);

    #[inline] pub fn epsg(&self) -> u32 { self.0 }

    /// True for lon/lat systems whose PROJ.4 coordinates are angular.
    pub fn is_geographic(&self) -> bool { matches!(self.0, 4326 | 4269 | 4258 | 4937) }

    /// UTM zone (WGS84 datum) containing the given lon/lat.
    pub fn utm_for(lon: f64, lat: f64) -> Crs {
        let zone = (((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u32;
        if lat >= 0.0 { Crs(32600 + zone) } else { Crs(32700 + zone) }
    }

    /// PROJ.4 definition for the supported EPSG codes.
    pub fn proj4(&self) -> Result<String> {
        let def = match self.0 {
            4326 => "+proj=longlat +datum=WGS84 +no_defs +type=crs".to_string(),
            4269 | 4937 => "+proj=longlat +datum=NAD83 +no_defs +type=crs".to_string(),
            4258 => "+proj=longlat +ellps=GRS80 +no_defs +type=crs".to_string(),
            3857 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs +type=crs".to_string(),
            code @ 32601..=32660 => format!("+proj=utm +zone={} +datum=WGS84 +units=m +no_defs +type=crs", code - 32600),
            code @ 32701..=32760 => format!("+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs +type=crs", code - 32700),
            code => return Err(HazardError::UnsupportedCrs(code).into()),
        };
        Ok(def)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Point transformation between two CRSs; identity when they are equal.
pub struct Reprojector {
    inner: Option<(Proj4, Proj4)>,
    from_geographic: bool,
    to_geographic: bool,
}

impl Reprojector {
    pub fn new(from: Crs, to: Crs) -> Result<Self> {
        if from == to {
            return Ok(Self { inner: None, from_geographic: false, to_geographic: false })
        }

        let build = |crs: Crs| -> Result<Proj4> {
            let def = crs.proj4()?;
            Proj4::from_proj_string(&def)
                .with_context(|| format!("[raster::crs] failed to build PROJ.4: {def}"))
        };

        Ok(Self {
            inner: Some((build(from)?, build(to)?)),
            from_geographic: from.is_geographic(),
            to_geographic: to.is_geographic(),
        })
    }

    #[inline] pub fn is_identity(&self) -> bool { self.inner.is_none() }

    /// Transform one coordinate pair (degrees for geographic CRSs, metres otherwise).
    pub fn apply(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let Some((from, to)) = &self.inner else { return Ok((x, y)) };

        let mut point = if self.from_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(from, to, &mut point)
            .with_context(|| format!("[raster::crs] transform failed for ({x}, {y})"))?;

        Ok(if self.to_geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        })
    }
}
