//! Container storage abstraction.
//!
//! The range server never touches the file system directly; it depends on
//! the [`ContainerStore`] capability (query size, open a byte-range
//! stream), so the backing store can be swapped for an in-memory buffer
//! under test.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_stream::Stream;

use crate::error::Result;

pub use file_store::FileStore;
#[cfg(test)]
pub use memory::MemoryStore;

mod file_store;
#[cfg(test)]
mod memory;

/// A stream of container bytes handed to the HTTP response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Capability interface over the single growing container.
///
/// Contract notes shared by all implementations:
/// - `size` reads fresh from the backing store on every call; the container
///   may still be growing and callers must not cache the result across
///   requests.
/// - `read_range` captures a handle at call time. Deleting the container
///   afterwards must not break the in-flight read; the reader keeps working
///   against the content it opened (file-handle semantics on unlink).
/// - `append` is only called by the single writer; body bytes are immutable
///   once written, which is what makes concurrent reads safe without a lock.
#[async_trait]
pub trait ContainerStore: Send + Sync {
    /// Whether a container currently exists on the backing store.
    async fn exists(&self) -> bool;

    /// Current total size in bytes (header + body written so far).
    async fn size(&self) -> Result<u64>;

    /// Creates a fresh container holding exactly `header`, replacing any
    /// stale container left behind by a crash between reset and retry.
    async fn create(&self, header: &[u8]) -> Result<()>;

    /// Appends `payload` to the container body.
    async fn append(&self, payload: &[u8]) -> Result<()>;

    /// Removes the container. Succeeds if no container exists.
    async fn delete(&self) -> Result<()>;

    /// Opens a stream over exactly `len` bytes starting at `start`.
    ///
    /// The window is validated by the caller against a size snapshot; the
    /// stream ends early only on I/O error or reader disconnect.
    async fn read_range(&self, start: u64, len: u64) -> Result<ByteStream>;
}
