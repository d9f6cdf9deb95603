//! Ingestion writer and stream lifecycle.
//!
//! One [`StreamRecorder`] per process owns the container: it materializes
//! the WAV header on the first chunk of a lifetime, appends every payload,
//! and tears the container down on reset. All mutation goes through a
//! single mutex so that header-write-plus-first-append and
//! delete-plus-state-clear are each observed atomically by concurrent
//! requests; body reads never take the lock because written bytes are
//! immutable.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{Result, WavecastError};
use crate::store::ContainerStore;
use crate::wav::{self, WavSpec};

/// Mutable state of the current container lifetime.
///
/// `body_bytes_written` is monotonically non-decreasing between resets. It
/// counts only fully-acknowledged appends; a torn append on storage failure
/// may leave extra bytes past this count, which readers tolerate as a
/// trailing incomplete frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamState {
    pub header_written: bool,
    pub body_bytes_written: u64,
}

/// Single-writer ingestion frontend over a [`ContainerStore`].
pub struct StreamRecorder {
    store: Arc<dyn ContainerStore>,
    state: Mutex<StreamState>,
}

impl StreamRecorder {
    /// Creates a recorder in the pre-ingestion state, defensively removing
    /// any container a previous process crash left behind.
    pub async fn new(store: Arc<dyn ContainerStore>) -> Self {
        if store.exists().await {
            info!("Removing stale container from a previous run");
            if let Err(e) = store.delete().await {
                warn!("Failed to remove stale container: {e}");
            }
        }
        Self {
            store,
            state: Mutex::new(StreamState::default()),
        }
    }

    /// The container accessor shared with the range server.
    pub fn store(&self) -> Arc<dyn ContainerStore> {
        self.store.clone()
    }

    /// Appends one chunk, creating the container first when this is the
    /// initial chunk of a lifetime. Returns the body length after the
    /// append.
    ///
    /// `spec` is honored only on the call that writes the header; the
    /// header is immutable once written, so parameters carried by later
    /// chunks of the same lifetime are deliberately ignored.
    pub async fn ingest(&self, payload: &[u8], spec: &WavSpec) -> Result<u64> {
        if payload.is_empty() {
            return Err(WavecastError::InvalidChunk("empty payload".to_string()));
        }

        let mut state = self.state.lock().await;

        if !state.header_written {
            spec.validate()?;

            // A crash between a reset's delete and the producer's retry can
            // leave a stale container; clear it before starting fresh.
            if self.store.exists().await {
                self.store.delete().await?;
            }

            self.store.create(&wav::streaming_header(spec)).await?;
            state.header_written = true;
            state.body_bytes_written = 0;
            info!(
                sample_rate = spec.sample_rate,
                channels = spec.channels,
                bits_per_sample = spec.bits_per_sample,
                "Started new stream container"
            );
        }

        self.store.append(payload).await?;
        state.body_bytes_written += payload.len() as u64;
        Ok(state.body_bytes_written)
    }

    /// Retires the current container and returns to the pre-ingestion
    /// state. Idempotent; a failed delete is logged but the state is
    /// cleared regardless, since the state is the writer's source of truth
    /// for whether a stream exists.
    ///
    /// Reads in flight keep their already-open handles and are not
    /// cancelled.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;

        if let Err(e) = self.store.delete().await {
            warn!("Failed to delete container during reset: {e}");
        }

        if state.header_written {
            info!(body_bytes = state.body_bytes_written, "Stream reset");
        }
        *state = StreamState::default();
    }

    /// Whether a stream has been started since process start or the last
    /// reset.
    pub async fn is_active(&self) -> bool {
        self.state.lock().await.header_written
    }

    /// Snapshot of the current state.
    pub async fn state(&self) -> StreamState {
        *self.state.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::wav::WAV_HEADER_LEN;

    fn recorder_with_store() -> (StreamRecorder, MemoryStore) {
        let store = MemoryStore::new();
        let recorder = StreamRecorder {
            store: Arc::new(store.clone()),
            state: Mutex::new(StreamState::default()),
        };
        (recorder, store)
    }

    #[tokio::test]
    async fn body_is_exact_concatenation_of_chunks() {
        let (recorder, store) = recorder_with_store();
        let spec = WavSpec::default();

        recorder.ingest(b"first-", &spec).await.unwrap();
        recorder.ingest(b"second-", &spec).await.unwrap();
        let total = recorder.ingest(b"third", &spec).await.unwrap();

        assert_eq!(total, 18);
        let contents = store.contents().unwrap();
        assert_eq!(&contents[WAV_HEADER_LEN as usize..], b"first-second-third");
        assert_eq!(contents.len() as u64, WAV_HEADER_LEN + 18);
    }

    #[tokio::test]
    async fn header_reflects_first_chunk_params_only() {
        let (recorder, store) = recorder_with_store();

        let first = WavSpec {
            sample_rate: 44_100,
            channels: 1,
            bits_per_sample: 16,
        };
        recorder.ingest(b"aaaa", &first).await.unwrap();

        // Different params on the second chunk must not rewrite the header.
        let ignored = WavSpec {
            sample_rate: 8_000,
            channels: 4,
            bits_per_sample: 32,
        };
        recorder.ingest(b"bbbb", &ignored).await.unwrap();

        let contents = store.contents().unwrap();
        let rate = u32::from_le_bytes(contents[24..28].try_into().unwrap());
        let channels = u16::from_le_bytes(contents[22..24].try_into().unwrap());
        assert_eq!(rate, 44_100);
        assert_eq!(channels, 1);
    }

    #[tokio::test]
    async fn empty_chunk_is_rejected_without_state_change() {
        let (recorder, store) = recorder_with_store();

        let err = recorder.ingest(b"", &WavSpec::default()).await.unwrap_err();
        assert!(matches!(err, WavecastError::InvalidChunk(_)));
        assert!(!recorder.is_active().await);
        assert!(store.contents().is_none());
    }

    #[tokio::test]
    async fn invalid_params_on_first_chunk_are_rejected() {
        let (recorder, _) = recorder_with_store();
        let bad = WavSpec {
            bits_per_sample: 7,
            ..WavSpec::default()
        };

        assert!(recorder.ingest(b"data", &bad).await.is_err());
        assert!(!recorder.is_active().await);
    }

    #[tokio::test]
    async fn reset_clears_state_and_is_idempotent() {
        let (recorder, store) = recorder_with_store();
        recorder.ingest(b"payload", &WavSpec::default()).await.unwrap();
        assert!(recorder.is_active().await);

        recorder.reset().await;
        assert_eq!(recorder.state().await, StreamState::default());
        assert!(store.contents().is_none());

        // Second reset with no ingestion between: identical observable state.
        recorder.reset().await;
        assert_eq!(recorder.state().await, StreamState::default());
        assert!(store.contents().is_none());
    }

    #[tokio::test]
    async fn new_lifetime_honors_new_params() {
        let (recorder, store) = recorder_with_store();

        recorder.ingest(b"x", &WavSpec::default()).await.unwrap();
        recorder.reset().await;

        let new_spec = WavSpec {
            sample_rate: 44_100,
            ..WavSpec::default()
        };
        recorder.ingest(b"y", &new_spec).await.unwrap();

        let contents = store.contents().unwrap();
        let rate = u32::from_le_bytes(contents[24..28].try_into().unwrap());
        assert_eq!(rate, 44_100);
        assert_eq!(recorder.state().await.body_bytes_written, 1);
    }

    #[tokio::test]
    async fn startup_cleanup_removes_leftover_container() {
        let store = MemoryStore::new();
        store.create(b"leftover-from-crash").await.unwrap();

        let recorder = StreamRecorder::new(Arc::new(store.clone())).await;
        assert!(store.contents().is_none());
        assert!(!recorder.is_active().await);
    }
}
