//! ffmpeg/ffprobe-backed implementations of the audio capabilities.

use super::{DurationProber, Transcoder};
use crate::error::{OmsorgError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Duration prober backed by the `ffprobe` binary.
#[derive(Debug, Default, Clone)]
pub struct FfprobeProber;

#[async_trait]
impl DurationProber for FfprobeProber {
    async fn duration_seconds(&self, path: &Path) -> Result<f64> {
        let result = Command::new("ffprobe")
            .arg("-v").arg("quiet")
            .arg("-print_format").arg("json")
            .arg("-show_format")
            .arg(path)
            .output()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OmsorgError::ToolNotFound("ffprobe".into()));
            }
            Err(e) => {
                return Err(OmsorgError::Probe(format!("ffprobe execution failed: {e}")));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OmsorgError::Probe(format!("ffprobe returned error: {stderr}")));
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        let parsed: serde_json::Value = serde_json::from_str(&json_str)
            .map_err(|_| OmsorgError::Probe("Invalid ffprobe output".into()))?;

        parsed["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| OmsorgError::Probe("Could not determine audio duration".into()))
    }
}

/// Transcoder backed by the `ffmpeg` binary.
///
/// Output is always single-channel 16 kHz FLAC, the format the recognition
/// service requires.
#[derive(Debug, Default, Clone)]
pub struct FfmpegTranscoder;

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn extract_chunk(
        &self,
        source: &Path,
        dest: &Path,
        start_seconds: f64,
        duration_seconds: f64,
    ) -> Result<()> {
        debug!(
            "Extracting {:.1}s at offset {:.1}s from {:?}",
            duration_seconds, start_seconds, source
        );

        let result = Command::new("ffmpeg")
            .arg("-ss").arg(format!("{:.3}", start_seconds))
            .arg("-i").arg(source)
            .arg("-t").arg(format!("{:.3}", duration_seconds))
            .arg("-ac").arg("1")
            .arg("-ar").arg("16000")
            .arg("-c:a").arg("flac")
            .arg("-y")
            .arg("-loglevel").arg("error")
            .arg(dest)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        match result {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => {
                let err = String::from_utf8_lossy(&out.stderr);
                Err(OmsorgError::Transcode(format!("ffmpeg chunk extraction failed: {err}")))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(OmsorgError::ToolNotFound("ffmpeg".into()))
            }
            Err(e) => Err(OmsorgError::Transcode(format!("ffmpeg error: {e}"))),
        }
    }
}
