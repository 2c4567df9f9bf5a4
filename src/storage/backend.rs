//! Abstract object store trait.
//!
//! A store is scoped to a single bucket, so every operation only takes
//! the object key.  Downloads hand back an [`ObjectReader`] rather than
//! a buffer so callers can stream the body wherever they like.

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Streaming body of a downloaded object.  Dropping it closes the stream.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Async object storage contract.
pub trait ObjectStore: Send + Sync + 'static {
    /// Store `data` under `key`.  The content length is `data.len()`.
    fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Open the object at `key` for reading.
    fn get_object(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ObjectReader>> + Send + '_>>;

    /// Delete the object at `key`.
    fn delete_object(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;
}
