use geo::{BoundingRect, Geometry, Rect};
use rstar::{RTree, RTreeObject, AABB};

/// Bounding rectangle of the geometry at `idx` in the indexed slice.
#[derive(Debug, Clone)]
struct BoundingBox {
    idx: usize,
    bbox: Rect<f64>,
}

impl RTreeObject for BoundingBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// R-tree over geometry envelopes, used to prefilter intersection tests.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    rtree: RTree<BoundingBox>,
}

impl SpatialIndex {
    /// Index every geometry that has a bounding rectangle; empty geometries are left out.
    pub fn new(geoms: &[Geometry<f64>]) -> Self {
        Self {
            rtree: RTree::bulk_load(
                geoms.iter().enumerate()
                    .filter_map(|(idx, geom)| geom.bounding_rect().map(|bbox| BoundingBox { idx, bbox }))
                    .collect()
            ),
        }
    }

    /// Indices of geometries whose envelope intersects `rect`, ascending.
    pub fn candidates(&self, rect: &Rect<f64>) -> Vec<usize> {
        let envelope = AABB::from_corners(rect.min().into(), rect.max().into());
        let mut hits = self.rtree.locate_in_envelope_intersecting(&envelope)
            .map(|b| b.idx)
            .collect::<Vec<_>>();
        hits.sort_unstable();
        hits
    }
}
