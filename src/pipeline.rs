//! Batch orchestration: every hazard runs to completion (read, transform,
//! aggregate, write) before the next one starts. A failing hazard is recorded
//! in the [`RunReport`] and the batch moves on.

use std::fmt;

use anyhow::{Context, Result};
use polars::prelude::DataFrame;
use tracing::{error, info};

use crate::{
    config::{Config, ExposureHazard, COASTAL_EROSION, CYCLONE, DEFORESTATION},
    error::HazardError,
    export::export_table,
    hazard::{self, load_raster},
    raster::{write_geotiff, Raster},
    storage::{open_store, ObjectStore},
    vector::{read_vector, AdminLayer},
};

/// Result of one hazard in a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum HazardStatus {
    /// Output written to `path`.
    Done { path: String, rows: Option<usize> },
    /// Hazard aborted; the message carries the full error chain.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HazardOutcome {
    pub key: String,
    pub status: HazardStatus,
}

/// Status of every hazard attempted in a batch, in run order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub outcomes: Vec<HazardOutcome>,
}

impl RunReport {
    fn record(&mut self, key: &str, result: Result<(String, Option<usize>)>) {
        let status = match result {
            Ok((path, rows)) => HazardStatus::Done { path, rows },
            Err(e) => {
                error!(hazard = key, "[pipeline] {e:#}");
                HazardStatus::Failed(format!("{e:#}"))
            }
        };
        self.outcomes.push(HazardOutcome { key: key.to_string(), status });
    }

    /// True when no hazard failed.
    pub fn is_success(&self) -> bool { self.failures().next().is_none() }

    /// Keys and messages of the failed hazards.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            HazardStatus::Failed(msg) => Some((o.key.as_str(), msg.as_str())),
            HazardStatus::Done { .. } => None,
        })
    }

    pub fn status(&self, key: &str) -> Option<&HazardStatus> {
        self.outcomes.iter().find(|o| o.key == key).map(|o| &o.status)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            match &outcome.status {
                HazardStatus::Done { path, rows: Some(rows) } => writeln!(f, "  ok      {:<16} {rows} rows -> {path}", outcome.key)?,
                HazardStatus::Done { path, rows: None } => writeln!(f, "  ok      {:<16} -> {path}", outcome.key)?,
                HazardStatus::Failed(msg) => writeln!(f, "  FAILED  {:<16} {msg}", outcome.key)?,
            }
        }
        Ok(())
    }
}

/// Configured pipeline bound to its object store.
pub struct Pipeline {
    config: Config,
    store: Box<dyn ObjectStore>,
}

impl Pipeline {
    pub fn new(config: Config, store: Box<dyn ObjectStore>) -> Self { Self { config, store } }

    /// Open the store named by the configuration.
    pub fn open(config: Config) -> Result<Self> {
        let store = open_store(&config.storage)?;
        Ok(Self::new(config, store))
    }

    #[inline] pub fn config(&self) -> &Config { &self.config }
    #[inline] pub fn store(&self) -> &dyn ObjectStore { self.store.as_ref() }

    /// Run every configured hazard in order.
    pub fn run_all(&self) -> RunReport {
        let keys = self.config.hazard_keys();
        info!(hazards = keys.len(), "[pipeline] starting batch");

        let mut report = RunReport::default();
        let admin = AdminLayer::load(self.store(), &self.config.admin);
        let mut population = None;

        for key in keys {
            let result = match &admin {
                Ok(admin) => self.process_and_export(key, admin, &mut population),
                Err(e) => Err(anyhow::anyhow!("admin boundaries unavailable: {e:#}")),
            };
            report.record(key, result);
        }
        report
    }

    /// Run a single hazard; returns the key its result was written to.
    pub fn run_one(&self, key: &str) -> Result<String> {
        self.config.output_path(key)?;
        let admin = AdminLayer::load(self.store(), &self.config.admin)?;
        let (path, _) = self.process_and_export(key, &admin, &mut None)?;
        Ok(path)
    }

    /// Precompute exposure rasters for every exposure hazard and store them at
    /// their prepared keys.
    pub fn prepare_exposures(&self) -> RunReport {
        let mut report = RunReport::default();
        let population = self.load_population();

        for hazard in &self.config.exposures {
            let result = population.as_ref()
                .map_err(|e| anyhow::anyhow!("population raster unavailable: {e:#}"))
                .and_then(|population| self.prepare_one(hazard, population));
            report.record(&hazard.key, result.map(|path| (path, None)));
        }
        report
    }

    fn prepare_one(&self, hazard: &ExposureHazard, population: &Raster) -> Result<String> {
        info!(hazard = %hazard.key, threshold = hazard.threshold, "[prepare] computing exposure raster");
        let hazard_raster = load_raster(self.store(), &hazard.raster)?;
        let exposure = hazard::exposure_raster(&hazard_raster, population, hazard.threshold)
            .with_context(|| format!("[pipeline::prepare] failed to build {} exposure", hazard.key))?;

        let path = self.config.prepared_path(hazard);
        self.store.put(&path, &write_geotiff(&exposure)?)?;
        info!(hazard = %hazard.key, path = %self.store.locate(&path), "[prepare] saved exposure raster");
        Ok(path)
    }

    fn process_and_export(&self, key: &str, admin: &AdminLayer, population: &mut Option<Raster>) -> Result<(String, Option<usize>)> {
        info!(hazard = key, "[pipeline] processing");
        let table = self.compute_with(key, admin, population)?;
        let path = export_table(&table, key, &self.config, self.store())?;
        Ok((path.to_string(), Some(table.height())))
    }

    fn compute_with(&self, key: &str, admin: &AdminLayer, population: &mut Option<Raster>) -> Result<DataFrame> {
        let options = self.config.zonal_options();

        if let Some(hazard) = self.config.exposure(key) {
            if population.is_none() {
                *population = Some(self.load_population()?);
            }
            let population = population.as_ref()
                .ok_or_else(|| HazardError::MissingInput(self.config.population.clone()))?;
            let exposure = if self.config.use_prepared {
                load_raster(self.store(), &self.config.prepared_path(hazard))?
            } else {
                let raster = load_raster(self.store(), &hazard.raster)?;
                hazard::exposure_raster(&raster, population, hazard.threshold)?
            };
            return hazard::exposure_table(admin, population, &exposure, options)
        }

        match key {
            DEFORESTATION => {
                let inputs = &self.config.deforestation;
                let loss = load_raster(self.store(), &inputs.loss)?;
                let cover = load_raster(self.store(), &inputs.cover)?;
                hazard::deforestation(admin, &loss, &cover, inputs.threshold, options)
            }
            CYCLONE => {
                let wind = load_raster(self.store(), &self.config.cyclone.raster)?;
                hazard::cyclone(admin, &wind, options)
            }
            COASTAL_EROSION => {
                let inputs = &self.config.coastal_erosion;
                let features = read_vector(self.store(), &inputs.vector)?;
                hazard::coastal_erosion(admin, &features, inputs.buffer, &inputs.rate_column)
            }
            other => Err(HazardError::UnknownHazard(other.to_string()).into()),
        }
    }

    fn load_population(&self) -> Result<Raster> {
        let population = load_raster(self.store(), &self.config.population)
            .context("[pipeline] failed to load population raster")?;
        info!(shape = ?population.shape(), crs = ?population.crs(), "[pipeline] loaded population raster");
        Ok(population)
    }
}
