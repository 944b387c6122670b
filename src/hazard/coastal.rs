use anyhow::{Context, Result};
use geo::{BoundingRect, Buffer, Geometry, Intersects, MultiPolygon};
use polars::prelude::*;
use tracing::debug;

use crate::{
    config::BufferPolicy,
    error::HazardError,
    raster::{Crs, Reprojector},
    vector::{reproject_geometry, AdminLayer, SpatialIndex, VectorLayer},
};

/// `mean_rate_time`: mean rate of the hazard features meeting each buffered region.
///
/// Regions are buffered outward, joined to every hazard feature they intersect,
/// and the rates are averaged per finest admin id. Regions with no feature keep
/// their row with a null mean.
pub fn coastal_erosion(
    admin: &AdminLayer,
    hazard: &VectorLayer,
    buffer: BufferPolicy,
    rate_column: &str,
) -> Result<DataFrame> {
    let id_col = admin.finest_id()
        .ok_or_else(|| HazardError::MissingInput("admin id column (adm2_src, adm1_src or adm0_src)".into()))?;

    let (work_crs, distance) = match buffer {
        BufferPolicy::Meters(d) => (admin.utm_crs()?, d),
        BufferPolicy::Degrees(d) => (admin.crs().unwrap_or(Crs::WGS84), d),
    };

    let zones = admin.shapes_in(work_crs)?.iter()
        .map(|shape| shape.buffer(distance))
        .collect::<Vec<MultiPolygon<f64>>>();

    let hazard_crs = hazard.crs.unwrap_or(Crs::WGS84);
    let reprojector = Reprojector::new(hazard_crs, work_crs)?;
    let features = hazard.features.iter()
        .map(|f| reproject_geometry(&f.geometry, &reprojector))
        .collect::<Result<Vec<Geometry<f64>>>>()
        .context("[hazard::coastal] failed to reproject hazard features")?;
    let rates = hazard.features.iter().map(|f| f.number(rate_column)).collect::<Vec<_>>();

    // Spatial join: one (region row, rate) pair per intersecting feature.
    let index = SpatialIndex::new(&features);
    let mut pair_rows = Vec::new();
    let mut pair_rates = Vec::new();
    for (row, zone) in zones.iter().enumerate() {
        let Some(bbox) = zone.bounding_rect() else { continue };
        for idx in index.candidates(&bbox) {
            if zone.intersects(&features[idx]) {
                pair_rows.push(row as IdxSize);
                pair_rates.push(rates[idx]);
            }
        }
    }
    debug!(regions = admin.len(), features = features.len(), pairs = pair_rows.len(), %work_crs, "[hazard::coastal] joined");

    let ids = admin.data().column(id_col)?.take_slice(&pair_rows)?;
    let joined = DataFrame::new(vec![
        ids,
        Column::new("rate".into(), pair_rates),
    ])?;

    let stats = joined.lazy()
        .group_by([col(id_col)])
        .agg([col("rate").mean().alias("mean_rate_time")])
        .collect()?;

    Ok(admin.data()
        .with_row_index("idx".into(), None)?
        .left_join(&stats, [id_col], [id_col])?
        .sort(["idx"], SortMultipleOptions::default())?
        .drop("idx")?)
}
