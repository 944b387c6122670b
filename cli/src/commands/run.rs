use anyhow::{bail, Context, Result};
use hazard_exposure::{Config, Pipeline};
use tracing::info;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::RunArgs, mut config: Config) -> Result<()> {
    config.use_prepared |= args.prepared;
    let pipeline = Pipeline::open(config)?;

    let Some(hazard) = &args.hazard else {
        let report = pipeline.run_all();
        println!("[run] batch finished\n{report}");
        if !report.is_success() {
            bail!("[run] {} of {} hazards failed", report.failures().count(), report.outcomes.len());
        }
        return Ok(())
    };

    let key = pipeline.run_one(hazard)?;
    println!("[run] {hazard} saved to {}", pipeline.store().locate(&key));

    if let Some(out_path) = &args.output {
        let bytes = pipeline.store().get(&key)?;
        if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("[run] failed to create {}", parent.display()))?;
        }
        std::fs::write(out_path, bytes)
            .with_context(|| format!("[run] failed to write {}", out_path.display()))?;
        info!(path = %out_path.display(), "[run] copied result");
        println!("[run] {hazard} copied to {}", out_path.display());
    }

    Ok(())
}
