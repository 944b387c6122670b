//! Run configuration: where inputs live, where results go, and hazard thresholds.

use std::{collections::BTreeMap, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{error::HazardError, zonal::ZonalOptions};

pub const DEFORESTATION: &str = "deforestation";
pub const CYCLONE: &str = "cyclone";
pub const COASTAL_EROSION: &str = "coastal_erosion";

/// Backend holding every input and output key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
    Local {
        root: PathBuf,
    },
    S3 {
        bucket: String,
        region: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },
}

impl Default for StorageConfig {
    fn default() -> Self { StorageConfig::Local { root: PathBuf::from(".") } }
}

/// A hazard measured as population living where its raster exceeds a threshold
/// (flood, earthquake, landslide).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureHazard {
    pub key: String,
    pub raster: String,
    pub threshold: f64,
    /// Precomputed exposure raster; defaults to `prep_data/<region>_<key>_prep.tif`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepared: Option<String>,
}

impl ExposureHazard {
    pub fn new(key: &str, raster: &str, threshold: f64) -> Self {
        Self { key: key.into(), raster: raster.into(), threshold, prepared: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeforestationInputs {
    pub loss: String,
    pub cover: String,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycloneInputs {
    pub raster: String,
}

/// Outward buffer applied to admin polygons before the coastal join.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "distance", rename_all = "lowercase")]
pub enum BufferPolicy {
    /// Metres, in the UTM zone of the admin layer's centre.
    Meters(f64),
    /// Degrees, in the admin layer's own lon/lat CRS.
    Degrees(f64),
}

impl Default for BufferPolicy {
    fn default() -> Self { BufferPolicy::Meters(1000.0) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoastalInputs {
    pub vector: String,
    #[serde(default)]
    pub buffer: BufferPolicy,
    #[serde(default = "default_rate_column")]
    pub rate_column: String,
}

fn default_rate_column() -> String { "rate_time".into() }

/// Complete configuration for one run; built once and handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    /// Region tag used in derived file names, e.g. "sadc".
    pub region: String,
    pub population: String,
    pub admin: String,
    pub exposures: Vec<ExposureHazard>,
    pub deforestation: DeforestationInputs,
    pub cyclone: CycloneInputs,
    pub coastal_erosion: CoastalInputs,
    /// Result CSV key per hazard.
    pub outputs: BTreeMap<String, String>,
    /// Read exposure rasters from their prepared keys instead of recomputing them.
    pub use_prepared: bool,
    /// Zonal selection of every touched cell rather than centre-in-polygon cells.
    pub all_touched: bool,
}

impl Default for Config {
    fn default() -> Self {
        let exposures = [("flood", 0.0), ("earthquake", 0.115), ("landslide", 2.5)]
            .into_iter()
            .map(|(key, threshold)| ExposureHazard::new(key, &format!("hazard_data/{key}/sadc_{key}.tif"), threshold))
            .collect::<Vec<_>>();

        let outputs = exposures.iter().map(|h| h.key.as_str())
            .chain([DEFORESTATION, CYCLONE, COASTAL_EROSION])
            .map(|key| (key.to_string(), format!("output_data/{key}/{key}.csv")))
            .collect();

        Self {
            storage: StorageConfig::default(),
            region: "sadc".into(),
            population: "pop_data/sadc_pop_1km.tif".into(),
            admin: "admin_data/sadc_adm1.geojson".into(),
            exposures,
            deforestation: DeforestationInputs {
                loss: "hazard_data/deforestation/sadc_lossyear.tif".into(),
                cover: "hazard_data/deforestation/sadc_treecover.tif".into(),
                threshold: 0.0,
            },
            cyclone: CycloneInputs {
                raster: "hazard_data/cyclone/STORM_FIXED_RETURN_PERIODS_SI_100_YR_RP.tif".into(),
            },
            coastal_erosion: CoastalInputs {
                vector: "hazard_data/coastal_erosion/sadc_coastal_erosion.shp".into(),
                buffer: BufferPolicy::default(),
                rate_column: default_rate_column(),
            },
            outputs,
            use_prepared: false,
            all_touched: false,
        }
    }
}

impl Config {
    /// Read a JSON configuration; missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("[config::from_file] failed to read {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("[config::from_file] invalid configuration in {}", path.display()))
    }

    /// Apply process environment overrides (see [`Config::with_overrides`]).
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply storage overrides from a variable lookup:
    /// - `USE_LOCAL` truthy: local storage under the current root (or ".")
    /// - `S3_BUCKET`: S3 storage in that bucket, region from `AWS_DEFAULT_REGION`
    ///   or `AWS_REGION`, endpoint from `AWS_ENDPOINT_URL`; credentials are left
    ///   to the AWS provider chain
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let truthy = |v: String| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");

        if lookup("USE_LOCAL").is_some_and(truthy) {
            if !matches!(self.storage, StorageConfig::Local { .. }) {
                self.storage = StorageConfig::default();
            }
        } else if let Some(bucket) = lookup("S3_BUCKET").filter(|b| !b.is_empty()) {
            let region = lookup("AWS_DEFAULT_REGION")
                .or_else(|| lookup("AWS_REGION"))
                .or_else(|| match &self.storage {
                    StorageConfig::S3 { region, .. } => Some(region.clone()),
                    StorageConfig::Local { .. } => None,
                })
                .unwrap_or_else(|| "us-east-1".into());

            self.storage = StorageConfig::S3 {
                bucket,
                region,
                endpoint: lookup("AWS_ENDPOINT_URL"),
            };
        }
        self
    }

    /// Result key for a hazard.
    pub fn output_path(&self, key: &str) -> Result<&str> {
        self.outputs.get(key)
            .map(String::as_str)
            .ok_or_else(|| HazardError::UnknownHazard(key.to_string()).into())
    }

    /// Every hazard key, in run order.
    pub fn hazard_keys(&self) -> Vec<&str> {
        self.exposures.iter().map(|h| h.key.as_str())
            .chain([DEFORESTATION, CYCLONE, COASTAL_EROSION])
            .collect()
    }

    /// Exposure hazard descriptor by key.
    pub fn exposure(&self, key: &str) -> Option<&ExposureHazard> {
        self.exposures.iter().find(|h| h.key == key)
    }

    /// Key of the prepared exposure raster for a hazard.
    pub fn prepared_path(&self, hazard: &ExposureHazard) -> String {
        hazard.prepared.clone()
            .unwrap_or_else(|| format!("prep_data/{}_{}_prep.tif", self.region, hazard.key))
    }

    #[inline]
    pub fn zonal_options(&self) -> ZonalOptions { ZonalOptions { all_touched: self.all_touched } }
}
