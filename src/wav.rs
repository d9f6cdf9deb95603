//! Streaming WAV container framing.
//!
//! A live capture has no known final length, so the header carries the
//! maximum representable value (`u32::MAX`) in both the RIFF chunk-size
//! field and the `data` chunk-size field. Players recognize the sentinel
//! and fall back to reading until EOF, which is what makes a still-growing
//! file playable. The sentinel is part of the wire contract and must not
//! be "fixed up" to a real length.

use crate::error::{Result, WavecastError};

/// Size of the canonical PCM WAV header: RIFF descriptor (12 bytes) +
/// `fmt ` sub-chunk (24 bytes) + `data` sub-chunk header (8 bytes).
pub const WAV_HEADER_LEN: u64 = 44;

/// Sentinel written into both length fields while the stream is live.
const UNKNOWN_LENGTH: u32 = u32::MAX;

/// PCM format parameters for one container lifetime.
///
/// Captured from the first ingested chunk of a lifetime and immutable until
/// the next reset; parameters carried by later chunks are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    /// Samples per second per channel (e.g. 44100, 48000).
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Bit depth of one sample. Must be 8, 16, 24 or 32.
    pub bits_per_sample: u16,
}

impl Default for WavSpec {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            bits_per_sample: 16,
        }
    }
}

impl WavSpec {
    /// Checks that the parameters describe an encodable PCM format.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(WavecastError::InvalidChunk("sampleRate must be positive".to_string()));
        }
        if self.channels == 0 {
            return Err(WavecastError::InvalidChunk("numChannels must be positive".to_string()));
        }
        if !matches!(self.bits_per_sample, 8 | 16 | 24 | 32) {
            return Err(WavecastError::InvalidChunk(format!(
                "bitsPerSample must be 8, 16, 24 or 32, got {}",
                self.bits_per_sample
            )));
        }

        // The derived header fields are fixed-width; parameter combinations
        // whose block align exceeds u16 or whose byte rate exceeds u32 are
        // unencodable and must be rejected before framing.
        let bytes_per_sample = self.bits_per_sample / 8;
        let block_align = self.channels.checked_mul(bytes_per_sample).ok_or_else(|| {
            WavecastError::InvalidChunk(format!(
                "block alignment overflows for {} channels at {} bits",
                self.channels, self.bits_per_sample
            ))
        })?;
        self.sample_rate.checked_mul(block_align as u32).ok_or_else(|| {
            WavecastError::InvalidChunk(format!(
                "byte rate overflows for sample rate {} with block alignment {}",
                self.sample_rate, block_align
            ))
        })?;

        Ok(())
    }

    /// Bytes per second of interleaved PCM at these parameters.
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * (self.bits_per_sample as u32 / 8)
    }

    /// Size in bytes of one frame (one sample across all channels).
    pub fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }
}

/// Builds the 44-byte header for a WAV container of unknown final length.
///
/// All multi-byte values are little-endian. The two size fields carry the
/// [`UNKNOWN_LENGTH`] sentinel; everything else is derived from `spec`.
pub fn streaming_header(spec: &WavSpec) -> [u8; WAV_HEADER_LEN as usize] {
    let mut header = [0u8; WAV_HEADER_LEN as usize];

    // RIFF descriptor.
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&UNKNOWN_LENGTH.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // `fmt ` sub-chunk: 16-byte PCM format description.
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM, uncompressed
    header[22..24].copy_from_slice(&spec.channels.to_le_bytes());
    header[24..28].copy_from_slice(&spec.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&spec.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&spec.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&spec.bits_per_sample.to_le_bytes());

    // `data` sub-chunk header; payload bytes follow immediately.
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&UNKNOWN_LENGTH.to_le_bytes());

    header
}
