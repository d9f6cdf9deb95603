//! Request handlers for the relay endpoints.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, WavecastError};
use crate::range::RangeHeader;
use crate::recorder::StreamRecorder;
use crate::wav::WavSpec;

/// Growing resources must never be retained by intermediaries; a stale
/// partial snapshot would be served as if it were the live stream.
const CACHE_CONTROL_VALUE: &str = "no-cache, no-store, must-revalidate";

/// Optional PCM parameters on `/upload-chunk`. Only the first chunk of a
/// container lifetime consults them; missing values fall back to defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ChunkParams {
    sample_rate: Option<u32>,
    num_channels: Option<u16>,
    bits_per_sample: Option<u16>,
}

impl From<ChunkParams> for WavSpec {
    fn from(params: ChunkParams) -> Self {
        let defaults = WavSpec::default();
        WavSpec {
            sample_rate: params.sample_rate.unwrap_or(defaults.sample_rate),
            channels: params.num_channels.unwrap_or(defaults.channels),
            bits_per_sample: params.bits_per_sample.unwrap_or(defaults.bits_per_sample),
        }
    }
}

/// `POST /upload-chunk`: appends one raw PCM chunk.
pub(super) async fn upload_chunk(
    State(recorder): State<Arc<StreamRecorder>>,
    Query(params): Query<ChunkParams>,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let spec = WavSpec::from(params);
    let body_bytes = recorder.ingest(&body, &spec).await?;
    debug!(chunk_len = body.len(), body_bytes, "Chunk ingested");
    Ok(Json(serde_json::json!({ "bytesWritten": body_bytes })))
}

/// `GET /stream`: serves the growing container, either in full (chunked,
/// no declared length) or as a bounded 206 window.
///
/// The container size is read fresh from storage and used for all range
/// arithmetic in this request; the writer may append past it while the
/// response is still streaming.
pub(super) async fn get_stream(
    State(recorder): State<Arc<StreamRecorder>>,
    headers: HeaderMap,
) -> Response {
    match serve_stream(recorder, &headers).await {
        Ok(response) => response,
        Err(e) => {
            // Every response of the read endpoint, 404 and 416 included,
            // must stay uncacheable and keep advertising range support; a
            // retained 404 would mask the stream coming back after the
            // next ingestion.
            let mut response = e.into_response();
            let headers = response.headers_mut();
            headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_VALUE));
            response
        }
    }
}

async fn serve_stream(recorder: Arc<StreamRecorder>, headers: &HeaderMap) -> Result<Response> {
    if !recorder.is_active().await {
        return Err(WavecastError::StreamNotFound);
    }

    let store = recorder.store();
    let size = store.size().await?;

    // A malformed Range header is ignored and the full resource is served;
    // only a well-formed but unsatisfiable range yields 416.
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(RangeHeader::parse);

    let response = match range {
        None => {
            debug!(size, "Serving full stream");
            let body = Body::from_stream(store.read_range(0, size).await?);
            stream_response(StatusCode::OK).body(body)
        }
        Some(range) => {
            let resolved = range.resolve(size)?;
            debug!(start = resolved.start, end = resolved.end, size, "Serving partial stream");
            let body = Body::from_stream(store.read_range(resolved.start, resolved.byte_len()).await?);
            stream_response(StatusCode::PARTIAL_CONTENT)
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", resolved.start, resolved.end, size),
                )
                .header(header::CONTENT_LENGTH, resolved.byte_len())
                .body(body)
        }
    };

    response.map_err(|e| WavecastError::Internal(format!("Failed to build response: {e}")))
}

/// Response scaffold shared by the 200 and 206 paths: WAV content type,
/// range support advertised, caching disabled.
fn stream_response(status: StatusCode) -> axum::http::response::Builder {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "audio/wav")
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CACHE_CONTROL, CACHE_CONTROL_VALUE)
}

/// `POST /reset-stream`: best-effort teardown, always 200.
pub(super) async fn reset_stream(State(recorder): State<Arc<StreamRecorder>>) -> StatusCode {
    recorder.reset().await;
    StatusCode::OK
}

/// `GET /health`: liveness only, no state inspection.
pub(super) async fn health() -> impl IntoResponse {
    "ok"
}
