use anyhow::Result;
use tracing::debug;

use crate::{
    raster::{align_to, binarize, population_exposure, Raster},
    vector::AdminLayer,
    zonal::{zonal_stats, Aggregation, ZonalOptions},
};
use super::{ratio, shapes_for, with_metrics};

/// Exposed-population raster on the population grid: align the hazard, mask it
/// at `threshold`, and multiply by population.
pub fn exposure_raster(hazard: &Raster, population: &Raster, threshold: f64) -> Result<Raster> {
    let aligned = align_to(hazard, population)?;
    let mask = binarize(&aligned, threshold);
    population_exposure(&mask, population)
}

/// `pop_exp`, `pop_tot` and `exp_ratio` per region.
pub fn exposure_table(
    admin: &AdminLayer,
    population: &Raster,
    exposure: &Raster,
    options: ZonalOptions,
) -> Result<polars::prelude::DataFrame> {
    let pop_shapes = shapes_for(admin, population)?;
    let exp_shapes = if exposure.same_grid(population) {
        pop_shapes.clone()
    } else {
        shapes_for(admin, exposure)?
    };

    let pop_exp = zonal_stats(exposure, &exp_shapes, Aggregation::Sum, options);
    let pop_tot = zonal_stats(population, &pop_shapes, Aggregation::Sum, options);
    let exp_ratio = ratio(&pop_exp, &pop_tot);

    debug!(
        regions = admin.len(),
        exposed = pop_exp.iter().flatten().sum::<f64>(),
        total = pop_tot.iter().flatten().sum::<f64>(),
        "[hazard::exposure] aggregated"
    );

    with_metrics(admin, vec![("pop_exp", pop_exp), ("pop_tot", pop_tot), ("exp_ratio", exp_ratio)])
}
