//! S3-compatible object store built from a platform binding.
//!
//! The client uses the binding's static credentials and endpoint; the
//! default credential chain is never consulted.  Whether the endpoint
//! is reached over plain HTTP is decided by `storage.disable_ssl`.

use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info, warn};

use super::backend::{ObjectReader, ObjectStore};
use crate::binding::BindingConfig;
use crate::config::StorageConfig;

/// Tracing targets raised to debug when `storage.verbose_logging` is on.
pub const SDK_LOG_TARGETS: &[&str] = &["aws_smithy_runtime", "aws_sdk_s3", "aws_sigv4"];

/// Object store backed by the bound S3-compatible bucket.
pub struct S3ObjectStore {
    /// AWS S3 SDK client.
    client: Client,
    /// Bucket named by the binding.
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client for `binding`.
    pub async fn new(binding: &BindingConfig, options: &StorageConfig) -> anyhow::Result<Self> {
        if binding.endpoint_host.trim().is_empty() {
            anyhow::bail!("binding '{}' has an empty endpoint host", binding.service_name);
        }
        let endpoint = endpoint_url(&binding.endpoint_host, options.disable_ssl);
        if endpoint.starts_with("http://") {
            warn!(endpoint = %endpoint, "Storage endpoint uses plain HTTP");
        }

        let creds = Credentials::new(
            &binding.access_key_id,
            &binding.secret_access_key,
            None, // session_token
            None, // expiry
            "blobcheck-binding",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(binding.region.clone()))
            .endpoint_url(&endpoint)
            .credentials_provider(creds)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(options.force_path_style)
            .build();

        info!(
            "S3 object store initialized: endpoint={} bucket={} region={}",
            endpoint, binding.bucket_name, binding.region
        );

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: binding.bucket_name.clone(),
        })
    }

    /// Map an AWS SDK error to an anyhow error with context.
    fn map_sdk_error<E>(context: &str, err: E) -> anyhow::Error
    where
        E: std::error::Error,
    {
        anyhow::anyhow!("S3 {context}: {}", DisplayErrorContext(err))
    }
}

/// Endpoint URL for a bound host.
///
/// Hosts that already carry a scheme are used verbatim.
pub fn endpoint_url(host: &str, disable_ssl: bool) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else if disable_ssl {
        format!("http://{host}")
    } else {
        format!("https://{host}")
    }
}

impl ObjectStore for S3ObjectStore {
    fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            let content_length = data.len() as i64;
            debug!(
                "S3 put_object: bucket={} key={} length={} type={}",
                self.bucket, key, content_length, content_type
            );

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .content_type(content_type)
                .content_length(content_length)
                .body(ByteStream::from(data))
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("put_object", e))?;

            Ok(())
        })
    }

    fn get_object(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ObjectReader>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            debug!("S3 get_object: bucket={} key={}", self.bucket, key);

            let resp = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| {
                    let service_err = e.into_service_error();
                    if service_err.is_no_such_key() {
                        anyhow::anyhow!("object not found: {}/{}", self.bucket, key)
                    } else {
                        Self::map_sdk_error("get_object", service_err)
                    }
                })?;

            let reader: ObjectReader = Box::pin(resp.body.into_async_read());
            Ok(reader)
        })
    }

    fn delete_object(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            debug!("S3 delete_object: bucket={} key={}", self.bucket, key);

            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("delete_object", e))?;

            Ok(())
        })
    }
}
