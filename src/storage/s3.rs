use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{
    config::http::HttpResponse,
    error::{ProvideErrorMetadata, SdkError},
    primitives::ByteStream,
    Client,
};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::error::HazardError;
use super::ObjectStore;

/// Objects in an S3 bucket, through the AWS SDK.
///
/// Credentials come from the standard provider chain (environment, shared
/// profile, web identity, container or instance metadata). Calls block on a
/// private current-thread runtime.
pub struct S3Store {
    runtime: Runtime,
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Client for `bucket` in `region`. `endpoint` selects an S3-compatible
    /// service addressed path-style, e.g. `http://localhost:9000`.
    pub fn new(bucket: &str, region: &str, endpoint: Option<&str>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("[storage::s3] failed to start async runtime")?;

        let shared = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.to_string()))
                .load()
        );
        let mut config = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint {
            config = config.endpoint_url(endpoint.trim_end_matches('/')).force_path_style(true);
        }

        Ok(Self { runtime, client: Client::from_conf(config.build()), bucket: bucket.to_string() })
    }
}

impl ObjectStore for S3Store {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        debug!(bucket = %self.bucket, key, "[storage::s3] GET");
        self.runtime.block_on(async {
            let object = self.client.get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| classify(e, &self.locate(key), "GET"))?;

            let body = object.body.collect().await
                .with_context(|| format!("[storage::s3] failed to read body of {}", self.locate(key)))?;
            Ok::<_, anyhow::Error>(body.into_bytes().to_vec())
        })
    }

    fn has(&self, key: &str) -> bool {
        self.runtime.block_on(
            self.client.head_object().bucket(&self.bucket).key(key).send()
        ).is_ok()
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        debug!(bucket = %self.bucket, key, size = bytes.len(), "[storage::s3] PUT");
        self.runtime.block_on(
            self.client.put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(bytes.to_vec()))
                .send()
        ).map_err(|e| classify(e, &self.locate(key), "PUT"))?;
        Ok(())
    }

    fn locate(&self, key: &str) -> String { format!("s3://{}/{key}", self.bucket) }
}

/// Turn an SDK failure into a crate error where the status or error code
/// identifies one; other failures keep the SDK error with context.
fn classify<E>(err: SdkError<E, HttpResponse>, location: &str, op: &str) -> anyhow::Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|resp| resp.status().as_u16());
    let code = err.as_service_error().and_then(|e| e.code()).map(str::to_string);

    match status_error(status, code.as_deref(), location) {
        Some(e) => e.into(),
        None => anyhow::Error::new(err).context(format!("[storage::s3] {op} {location} failed")),
    }
}

/// 404 and `NoSuchKey` are a missing input; 401, 403 and `AccessDenied` a
/// refused one.
fn status_error(status: Option<u16>, code: Option<&str>, location: &str) -> Option<HazardError> {
    match (status, code) {
        (Some(404), _) | (_, Some("NoSuchKey" | "NotFound")) => Some(HazardError::MissingInput(location.to_string())),
        (Some(401 | 403), _) | (_, Some("AccessDenied" | "Forbidden")) => Some(HazardError::AccessDenied(location.to_string())),
        _ => None,
    }
}
