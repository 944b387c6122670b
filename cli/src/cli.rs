use std::path::PathBuf;

/// Hazard exposure indicators per administrative region
#[derive(clap::Parser, Debug)]
#[command(name = "hazex", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON configuration file; defaults are used when omitted
    #[arg(short, long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Compute and export hazard tables (all hazards unless --hazard is given)
    Run(RunArgs),

    /// Precompute exposure rasters for flood, earthquake and landslide
    Prepare,

    /// Print the effective configuration as JSON
    Config,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Single hazard to run, e.g. flood, cyclone, coastal_erosion
    #[arg(long)]
    pub hazard: Option<String>,

    /// Copy the hazard's CSV to this local file (requires --hazard)
    #[arg(short, long, requires = "hazard", value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Read prepared exposure rasters instead of recomputing them
    #[arg(long)]
    pub prepared: bool,
}
