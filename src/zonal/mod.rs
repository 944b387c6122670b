//! Zonal statistics: raster cell values aggregated per polygon.

mod rasterize;

use geo::MultiPolygon;
use ndarray::{s, Zip};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::raster::Raster;

/// Aggregation applied to the valid cells of each zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Max,
    Mean,
}

/// Cell selection options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZonalOptions {
    /// Select every cell a polygon touches instead of centre-in-polygon cells.
    pub all_touched: bool,
}

#[derive(Default)]
struct Accumulator {
    count: usize,
    sum: f64,
    max: f64,
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        self.max = if self.count == 0 { value } else { self.max.max(value) };
        self.sum += value;
        self.count += 1;
    }

    fn finish(&self, aggregation: Aggregation) -> Option<f64> {
        if self.count == 0 { return None }
        Some(match aggregation {
            Aggregation::Sum => self.sum,
            Aggregation::Max => self.max,
            Aggregation::Mean => self.sum / self.count as f64,
        })
    }
}

/// Aggregate `raster` over each polygon, in polygon order.
///
/// Missing cells (NaN or the raster's sentinel) are skipped; a polygon with no
/// valid cell yields `None`.
pub fn zonal_stats(
    raster: &Raster,
    shapes: &[MultiPolygon<f64>],
    aggregation: Aggregation,
    options: ZonalOptions,
) -> Vec<Option<f64>> {
    let (rows, cols) = raster.shape();

    let stats = shapes.iter()
        .map(|shape| {
            let cells = rasterize::cells_in(shape, raster.transform(), rows, cols, options.all_touched);
            let (row_range, col_range) = cells.window();
            let values = raster.data().slice(s![row_range, col_range]);

            let mut acc = Accumulator::default();
            Zip::from(cells.mask()).and(&values).for_each(|&selected, &value| {
                if selected && !raster.is_missing(value) {
                    acc.push(value);
                }
            });
            acc.finish(aggregation)
        })
        .collect::<Vec<_>>();

    debug!(
        zones = shapes.len(),
        empty = stats.iter().filter(|s| s.is_none()).count(),
        ?aggregation,
        "[zonal] aggregated raster"
    );

    stats
}
