//! Speech-recognition client.
//!
//! Each chunk is first attempted as one synchronous recognition call; only
//! when the service rejects the input as too long for synchronous
//! processing does the client escalate to the asynchronous long-running
//! path, polling the returned operation on a fixed backoff schedule under a
//! wall-clock budget.

mod client;
mod models;

pub use client::{SpeechClient, SYNC_TOO_LONG_MARKERS};
pub use models::{
    Operation, OperationError, RecognitionAudio, RecognitionConfig, RecognitionResult,
    RecognizeRequest, ResultSegment, SpeakerDiarizationConfig, SpeechAlternative, WordInfo,
};

use crate::error::Result;
use async_trait::async_trait;

/// Trait for per-chunk speech recognition.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognize one normalized audio chunk.
    async fn recognize_chunk(&self, audio: &[u8], language_code: &str)
        -> Result<RecognitionResult>;
}
