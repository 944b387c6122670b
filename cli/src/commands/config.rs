use anyhow::{Context, Result};
use hazard_exposure::Config;

pub fn run(_cli: &crate::cli::Cli, config: Config) -> Result<()> {
    let json = serde_json::to_string_pretty(&config)
        .context("[config] failed to serialize configuration")?;
    println!("{json}");
    Ok(())
}
