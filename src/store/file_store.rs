use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use super::{ByteStream, ContainerStore};
use crate::error::{Result, WavecastError};

/// Read granularity for range streaming.
const READ_BUF_SIZE: usize = 64 * 1024;

/// Bound on in-flight chunks per reader; a slow client applies backpressure
/// to the file read loop instead of buffering unboundedly.
const READER_CHANNEL_DEPTH: usize = 8;

/// File-backed container at a well-known path.
///
/// The path is stable for the process lifetime; the file itself is created
/// lazily on the first ingested chunk and removed on reset and shutdown.
pub struct FileStore {
    path: PathBuf,
    _tmp_dir: Option<TempDir>,
}

impl FileStore {
    /// A store backed by a file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            _tmp_dir: None,
        }
    }

    /// Default location: `wavecast-stream.wav` in the system temp directory.
    pub fn at_default_path() -> Self {
        Self::new(std::env::temp_dir().join("wavecast-stream.wav"))
    }

    /// A store in a fresh temporary directory, removed on drop. For tests.
    pub fn temporary() -> Result<Self> {
        let tmp_dir = TempDir::new()?;
        let path = tmp_dir.path().join("stream.wav");
        Ok(Self {
            path,
            _tmp_dir: Some(tmp_dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ContainerStore for FileStore {
    async fn exists(&self) -> bool {
        self.path.exists()
    }

    async fn size(&self) -> Result<u64> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(WavecastError::StreamNotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, header: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(&self.path)?;
        file.write_all(header)?;
        file.flush()?;
        Ok(())
    }

    async fn append(&self, payload: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(payload)?;
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_range(&self, start: u64, len: u64) -> Result<ByteStream> {
        // Open and position the handle up front so a concurrent reset
        // cannot break this read: once the handle exists, an unlink leaves
        // the old content readable until the handle is dropped.
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(start))?;

        let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(READER_CHANNEL_DEPTH);

        tokio::task::spawn_blocking(move || {
            let mut remaining = len;
            let mut buf = vec![0u8; READ_BUF_SIZE];

            while remaining > 0 {
                let want = remaining.min(READ_BUF_SIZE as u64) as usize;
                match file.read(&mut buf[..want]) {
                    Ok(0) => break, // at the tail of the window
                    Ok(n) => {
                        remaining -= n as u64;
                        // A failed send means the client disconnected and
                        // the body was dropped; stop reading immediately.
                        if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                            debug!("Reader disconnected with {remaining} bytes left in window");
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.blocking_send(Err(e));
                        break;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use tokio_stream::StreamExt;

    use super::*;

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn create_append_and_size() {
        let store = FileStore::temporary().unwrap();
        assert!(!store.exists().await);
        assert!(matches!(store.size().await, Err(WavecastError::StreamNotFound)));

        store.create(b"head").await.unwrap();
        store.append(b"body").await.unwrap();
        assert!(store.exists().await);
        assert_eq!(store.size().await.unwrap(), 8);

        let data = collect(store.read_range(0, 8).await.unwrap()).await;
        assert_eq!(data, b"headbody");
    }

    #[tokio::test]
    async fn create_replaces_stale_container() {
        let store = FileStore::temporary().unwrap();
        store.create(b"old-header").await.unwrap();
        store.append(b"old-body").await.unwrap();

        store.create(b"new").await.unwrap();
        assert_eq!(store.size().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn read_range_returns_exact_window() {
        let store = FileStore::temporary().unwrap();
        store.create(b"0123456789").await.unwrap();

        let data = collect(store.read_range(3, 4).await.unwrap()).await;
        assert_eq!(data, b"3456");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = FileStore::temporary().unwrap();
        store.delete().await.unwrap();
        store.create(b"x").await.unwrap();
        store.delete().await.unwrap();
        store.delete().await.unwrap();
        assert!(!store.exists().await);
    }

    #[tokio::test]
    async fn open_read_survives_delete() {
        let store = FileStore::temporary().unwrap();
        store.create(b"persistent-content").await.unwrap();

        let stream = store.read_range(0, 18).await.unwrap();
        store.delete().await.unwrap();

        // The handle was acquired before the unlink; the bytes stay
        // readable even though the path is gone.
        assert_eq!(collect(stream).await, b"persistent-content");
    }
}
