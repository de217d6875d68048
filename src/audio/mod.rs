//! Audio normalization and chunking.
//!
//! The recognition service takes single-channel 16 kHz FLAC and rejects
//! synchronous calls past a duration ceiling, so every recording is
//! normalized and, when long enough, sliced into fixed windows before
//! recognition. The external binaries sit behind narrow capability traits
//! so the pipeline can be exercised without spawning real processes.

mod ffmpeg;

pub use ffmpeg::{FfmpegTranscoder, FfprobeProber};

use crate::error::{OmsorgError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Longest recording accepted as a single synchronous recognition call.
pub const SYNC_CEILING_SECONDS: f64 = 55.0;

/// Window length used when a recording must be sliced.
pub const CHUNK_WINDOW_SECONDS: f64 = 50.0;

/// Reports an audio file's duration in seconds.
#[async_trait]
pub trait DurationProber: Send + Sync {
    async fn duration_seconds(&self, path: &Path) -> Result<f64>;
}

/// Materializes one normalized time slice of a source recording.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Extract `[start, start + duration)` from `source` into `dest` as
    /// single-channel 16 kHz FLAC.
    async fn extract_chunk(
        &self,
        source: &Path,
        dest: &Path,
        start_seconds: f64,
        duration_seconds: f64,
    ) -> Result<()>;
}

/// One normalized slice of the source recording, ready for recognition.
///
/// Index order defines transcript order. The file lives in the request's
/// scratch directory and disappears with it.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub path: PathBuf,
    pub start_offset_seconds: f64,
    pub duration_seconds: f64,
    pub index: usize,
}

/// A planned time window, before any file exists for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkWindow {
    pub start_seconds: f64,
    pub duration_seconds: f64,
}

/// Partition a recording's duration into recognition windows.
///
/// A recording at or under the sync ceiling stays whole. Anything longer is
/// cut into consecutive fixed windows with the remainder in the last one.
pub fn plan_chunks(total_duration: f64) -> Vec<ChunkWindow> {
    if total_duration <= SYNC_CEILING_SECONDS {
        return vec![ChunkWindow {
            start_seconds: 0.0,
            duration_seconds: total_duration,
        }];
    }

    let mut windows = Vec::new();
    let mut offset = 0.0;
    while offset < total_duration {
        windows.push(ChunkWindow {
            start_seconds: offset,
            duration_seconds: CHUNK_WINDOW_SECONDS.min(total_duration - offset),
        });
        offset += CHUNK_WINDOW_SECONDS;
    }
    windows
}

/// Probe `source`, plan its windows, and materialize one normalized chunk
/// file per window inside `scratch_dir`.
///
/// Windows are extracted sequentially in index order and the first failure
/// aborts the whole request; partially written chunk files are left for the
/// scratch directory's drop to remove.
pub async fn split_audio(
    prober: &dyn DurationProber,
    transcoder: &dyn Transcoder,
    source: &Path,
    scratch_dir: &Path,
) -> Result<Vec<AudioChunk>> {
    let total_duration = prober.duration_seconds(source).await?;
    if total_duration <= 0.0 {
        return Err(OmsorgError::Probe(format!(
            "Non-positive duration {:.3}s reported for {}",
            total_duration,
            source.display()
        )));
    }
    info!("Source audio duration: {:.1}s", total_duration);

    let windows = plan_chunks(total_duration);
    let mut chunks = Vec::with_capacity(windows.len());

    for (index, window) in windows.into_iter().enumerate() {
        let chunk_path = scratch_dir.join(format!("chunk_{:04}.flac", index));
        transcoder
            .extract_chunk(
                source,
                &chunk_path,
                window.start_seconds,
                window.duration_seconds,
            )
            .await?;

        debug!(
            "Created chunk {} at offset {:.1}s ({:.1}s)",
            index, window.start_seconds, window.duration_seconds
        );
        chunks.push(AudioChunk {
            path: chunk_path,
            start_offset_seconds: window.start_seconds,
            duration_seconds: window.duration_seconds,
            index,
        });
    }

    info!("Created {} audio chunk(s)", chunks.len());
    Ok(chunks)
}
