use anyhow::Result;
use polars::prelude::DataFrame;

use crate::{
    raster::{binarize, Raster},
    vector::AdminLayer,
    zonal::{zonal_stats, Aggregation, ZonalOptions},
};
use super::{ratio, shapes_for, with_metrics};

/// `loss`, `cover` and `deforestation` per region.
///
/// Both rasters are binarized at `threshold` and summed on their own grids, so
/// the columns count loss cells and initially forested cells.
pub fn deforestation(
    admin: &AdminLayer,
    loss: &Raster,
    cover: &Raster,
    threshold: f64,
    options: ZonalOptions,
) -> Result<DataFrame> {
    let loss_sum = zonal_stats(&binarize(loss, threshold), &shapes_for(admin, loss)?, Aggregation::Sum, options);
    let cover_sum = zonal_stats(&binarize(cover, threshold), &shapes_for(admin, cover)?, Aggregation::Sum, options);
    let share = ratio(&loss_sum, &cover_sum);

    with_metrics(admin, vec![("loss", loss_sum), ("cover", cover_sum), ("deforestation", share)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{raster::{Crs, GeoTransform}, vector::{Feature, VectorLayer}};
    use approx::assert_relative_eq;
    use geo::{polygon, Geometry};
    use serde_json::json;

    fn admin(regions: &[(&str, f64)]) -> AdminLayer {
        let features = regions.iter()
            .map(|&(id, x0)| Feature::new(
                Geometry::Polygon(polygon![(x: x0, y: 0.0), (x: x0 + 5.0, y: 0.0), (x: x0 + 5.0, y: 2.0), (x: x0, y: 2.0), (x: x0, y: 0.0)]),
                json!({ "adm1_src": id }).as_object().cloned().unwrap_or_default(),
            ))
            .collect();
        AdminLayer::from_layer(VectorLayer { features, crs: Some(Crs::WGS84) }).unwrap()
    }

    fn grid(rows: &[Vec<f64>]) -> Raster {
        Raster::from_rows(rows, GeoTransform::new(0.0, 2.0, 1.0, -1.0), Some(Crs::WGS84))
    }

    #[test]
    fn loss_over_cover() {
        // Five loss cells and ten cover cells in region A; nothing forested in region B.
        let loss = grid(&[
            vec![3.0, 12.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 7.0, 19.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        ]);
        let cover = grid(&[
            vec![80.0, 60.0, 55.0, 90.0, 10.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            vec![75.0, 40.0, 35.0, 20.0, 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        ]);

        let table = deforestation(&admin(&[("A", 0.0), ("B", 5.0)]), &loss, &cover, 0.0, ZonalOptions::default()).unwrap();

        let col = |name| table.column(name).unwrap().f64().unwrap().clone();
        assert_eq!(col("loss").get(0), Some(5.0));
        assert_eq!(col("cover").get(0), Some(10.0));
        assert_relative_eq!(col("deforestation").get(0).unwrap(), 0.5);

        assert_eq!(col("cover").get(1), Some(0.0));
        assert_eq!(col("deforestation").get(1), None);
    }
}
