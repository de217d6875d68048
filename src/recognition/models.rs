//! Wire types for the speech-recognition REST API.
//!
//! Field names are camelCase on the wire. Response types default every
//! field so partial upstream payloads deserialize instead of erroring.

use serde::{Deserialize, Serialize};

// ============================================================================
// Request Types
// ============================================================================

/// Body for both the synchronous and long-running recognition calls.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeRequest {
    pub config: RecognitionConfig,
    pub audio: RecognitionAudio,
}

/// Recognition parameters for one normalized chunk.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionConfig {
    pub encoding: String,
    pub sample_rate_hertz: u32,
    pub language_code: String,
    pub enable_automatic_punctuation: bool,
    pub diarization_config: SpeakerDiarizationConfig,
}

impl RecognitionConfig {
    /// Config matching the chunk format the transcoder produces.
    pub fn for_language(language_code: &str) -> Self {
        Self {
            encoding: "FLAC".to_string(),
            sample_rate_hertz: 16_000,
            language_code: language_code.to_string(),
            enable_automatic_punctuation: true,
            diarization_config: SpeakerDiarizationConfig::default(),
        }
    }
}

/// Speaker diarization request parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerDiarizationConfig {
    pub enable_speaker_diarization: bool,
    pub min_speaker_count: u32,
    pub max_speaker_count: u32,
}

impl Default for SpeakerDiarizationConfig {
    fn default() -> Self {
        Self {
            enable_speaker_diarization: true,
            min_speaker_count: 1,
            max_speaker_count: 4,
        }
    }
}

/// Inline audio payload (base64, no data-URI prefix).
#[derive(Debug, Clone, Serialize)]
pub struct RecognitionAudio {
    pub content: String,
}

// ============================================================================
// Response Types
// ============================================================================

/// Complete recognition output for one chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognitionResult {
    #[serde(default)]
    pub results: Vec<ResultSegment>,
}

/// One result segment; the service emits several per chunk, with
/// diarization-complete speaker tags reliably present only on a late one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSegment {
    #[serde(default)]
    pub alternatives: Vec<SpeechAlternative>,
}

impl ResultSegment {
    /// The top-ranked alternative, if any.
    pub fn best(&self) -> Option<&SpeechAlternative> {
        self.alternatives.first()
    }
}

/// A candidate transcription with optional per-word diarization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechAlternative {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub words: Vec<WordInfo>,
}

impl SpeechAlternative {
    /// Whether any word in this alternative carries a speaker tag.
    pub fn is_diarized(&self) -> bool {
        self.words.iter().any(|w| w.speaker_tag.is_some())
    }
}

/// One recognized word, possibly attributed to a speaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordInfo {
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_tag: Option<i32>,
}

// ============================================================================
// Long-Running Operation Types
// ============================================================================

/// Envelope returned by the long-running submit and poll calls.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub response: Option<RecognitionResult>,
}

/// Error carried by a completed-but-failed operation.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}
