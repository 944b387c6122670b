use anyhow::Result;
use polars::prelude::DataFrame;

use crate::{
    raster::Raster,
    vector::AdminLayer,
    zonal::{zonal_stats, Aggregation, ZonalOptions},
};
use super::{shapes_for, with_metrics};

/// `max_speed`: highest wind speed inside each region. No masking.
pub fn cyclone(admin: &AdminLayer, wind: &Raster, options: ZonalOptions) -> Result<DataFrame> {
    let max_speed = zonal_stats(wind, &shapes_for(admin, wind)?, Aggregation::Max, options);
    with_metrics(admin, vec![("max_speed", max_speed)])
}
