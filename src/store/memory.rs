//! In-memory container store, only used in tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use super::{ByteStream, ContainerStore};
use crate::error::{Result, WavecastError};

/// Buffer-backed [`ContainerStore`]. `None` means no container exists.
///
/// Reads snapshot the buffer at open time, mirroring the file store's
/// open-handle semantics across a concurrent delete.
#[derive(Default, Clone)]
pub struct MemoryStore {
    buf: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full container contents, for assertions.
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.buf.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerStore for MemoryStore {
    async fn exists(&self) -> bool {
        self.buf.lock().unwrap().is_some()
    }

    async fn size(&self) -> Result<u64> {
        match self.buf.lock().unwrap().as_ref() {
            Some(data) => Ok(data.len() as u64),
            None => Err(WavecastError::StreamNotFound),
        }
    }

    async fn create(&self, header: &[u8]) -> Result<()> {
        *self.buf.lock().unwrap() = Some(header.to_vec());
        Ok(())
    }

    async fn append(&self, payload: &[u8]) -> Result<()> {
        match self.buf.lock().unwrap().as_mut() {
            Some(data) => {
                data.extend_from_slice(payload);
                Ok(())
            }
            None => Err(WavecastError::Internal("append to missing container".to_string())),
        }
    }

    async fn delete(&self) -> Result<()> {
        *self.buf.lock().unwrap() = None;
        Ok(())
    }

    async fn read_range(&self, start: u64, len: u64) -> Result<ByteStream> {
        let snapshot = self
            .buf
            .lock()
            .unwrap()
            .clone()
            .ok_or(WavecastError::StreamNotFound)?;

        let start = start as usize;
        let end = (start + len as usize).min(snapshot.len());
        let window = Bytes::copy_from_slice(&snapshot[start.min(snapshot.len())..end]);

        Ok(Box::pin(tokio_stream::once(Ok(window))))
    }
}
