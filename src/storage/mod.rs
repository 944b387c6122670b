//! Byte-level access to input and output objects by store-relative key,
//! e.g. "pop_data/sadc_pop_1km.tif" or "output_data/flood/flood.csv".

mod local;
#[cfg(feature = "s3")]
mod s3;

use anyhow::Result;

use crate::config::StorageConfig;

pub use local::LocalStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

/// Read and write access to objects by key.
pub trait ObjectStore: Send + Sync {
    /// Fetch the full contents of `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Check whether `key` exists.
    fn has(&self, key: &str) -> bool;

    /// Write `bytes` to `key`, replacing any previous contents.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Human-readable location of `key`, for log lines.
    fn locate(&self, key: &str) -> String;
}

/// Open the store selected by the configuration.
pub fn open_store(config: &StorageConfig) -> Result<Box<dyn ObjectStore>> {
    match config {
        StorageConfig::Local { root } => Ok(Box::new(LocalStore::new(root))),
        #[cfg(feature = "s3")]
        StorageConfig::S3 { bucket, region, endpoint } => {
            Ok(Box::new(S3Store::new(bucket, region, endpoint.as_deref())?))
        }
        #[cfg(not(feature = "s3"))]
        StorageConfig::S3 { bucket, .. } => {
            anyhow::bail!("[storage::open_store] bucket {bucket} requires the `s3` feature")
        }
    }
}
