//! Failure classes raised by the pipeline.
//!
//! Functions return `anyhow::Result`; these variants are raised through it so
//! callers can classify a failure with `downcast_ref::<HazardError>()`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HazardError {
    /// Hazard key has no entry in the configuration.
    #[error("invalid hazard type: {0}")]
    UnknownHazard(String),

    /// Raster or vector resource could not be found.
    #[error("input not found: {0}")]
    MissingInput(String),

    /// Resource exists but the store refused access (missing or bad credentials).
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Raster or vector layer carries no coordinate reference system.
    #[error("undefined CRS for {0}")]
    UndefinedCrs(String),

    /// CRS is known but cannot be expressed as a PROJ.4 definition.
    #[error("unsupported CRS: EPSG:{0}")]
    UnsupportedCrs(u32),

    /// Two rasters expected to share a grid do not.
    #[error("grid mismatch: expected {expected:?} cells, found {found:?}")]
    GridMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// No target cell maps inside the source raster after reprojection.
    #[error("raster extents are disjoint after reprojection")]
    DisjointExtent,

    /// Geometry kind not usable for the requested operation.
    #[error("unsupported geometry: {0}")]
    UnsupportedGeometry(String),

    /// Raster payload is malformed or inconsistent with its header.
    #[error("invalid raster: {0}")]
    InvalidRaster(String),
}
