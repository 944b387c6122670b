use anyhow::{bail, Result};
use hazard_exposure::{Config, Pipeline};

pub fn run(_cli: &crate::cli::Cli, config: Config) -> Result<()> {
    let pipeline = Pipeline::open(config)?;

    let report = pipeline.prepare_exposures();
    println!("[prepare] exposure rasters\n{report}");
    if !report.is_success() {
        bail!("[prepare] {} exposure rasters failed", report.failures().count());
    }
    Ok(())
}
