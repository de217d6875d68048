//! Speech-to-text pipeline.
//!
//! Coordinates one `/stt` request end to end: scratch setup, probing and
//! chunking, per-chunk recognition, and transcript reconciliation. Chunks
//! are recognized strictly in index order with no concurrent dispatch, so a
//! failure on chunk k leaves no in-flight calls behind it and the speaker
//! continuation state stays deterministic.

use crate::audio::{split_audio, DurationProber, Transcoder};
use crate::error::Result;
use crate::recognition::{RecognitionResult, Recognizer};
use crate::reconcile::reconcile_transcript;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome of one speech-to-text request.
#[derive(Debug)]
pub struct SttOutcome {
    /// The reconciled, speaker-annotated transcript.
    pub transcription: String,
    /// Number of chunks the recording was split into.
    pub chunks_processed: usize,
    /// Per-chunk recognition payloads, in chunk order.
    pub raw: Vec<RecognitionResult>,
}

/// Per-chunk recognition state; the loop short-circuits on the first
/// `Failed`.
enum ChunkState {
    Pending,
    Succeeded(RecognitionResult),
    Failed,
}

/// The speech-to-text pipeline for one relay process.
///
/// Components are injected so tests can run the whole pipeline without
/// spawning binaries or touching the network. The pipeline itself is
/// stateless across requests; every request owns its scratch directory.
pub struct SttPipeline {
    prober: Arc<dyn DurationProber>,
    transcoder: Arc<dyn Transcoder>,
    recognizer: Arc<dyn Recognizer>,
    scratch_root: Option<PathBuf>,
}

impl SttPipeline {
    pub fn new(
        prober: Arc<dyn DurationProber>,
        transcoder: Arc<dyn Transcoder>,
        recognizer: Arc<dyn Recognizer>,
    ) -> Self {
        Self {
            prober,
            transcoder,
            recognizer,
            scratch_root: None,
        }
    }

    /// Create scratch directories under `root` instead of the system temp
    /// directory.
    pub fn with_scratch_root(mut self, root: PathBuf) -> Self {
        self.scratch_root = Some(root);
        self
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir> {
        let builder_result = match &self.scratch_root {
            Some(root) => tempfile::Builder::new().prefix("omsorg-stt-").tempdir_in(root),
            None => tempfile::Builder::new().prefix("omsorg-stt-").tempdir(),
        };
        Ok(builder_result?)
    }

    /// Run the full pipeline on one uploaded recording.
    ///
    /// The scratch directory (input file and all chunk files) is removed on
    /// every exit path when the `TempDir` guard drops.
    #[instrument(skip(self, audio_bytes), fields(bytes = audio_bytes.len(), language = language_code))]
    pub async fn run(&self, audio_bytes: &[u8], language_code: &str) -> Result<SttOutcome> {
        let scratch = self.scratch_dir()?;
        let input_path = scratch.path().join("input.m4a");
        tokio::fs::write(&input_path, audio_bytes).await?;

        let chunks = split_audio(
            self.prober.as_ref(),
            self.transcoder.as_ref(),
            &input_path,
            scratch.path(),
        )
        .await?;

        let mut states: Vec<ChunkState> =
            chunks.iter().map(|_| ChunkState::Pending).collect();

        for chunk in &chunks {
            let chunk_audio = tokio::fs::read(&chunk.path).await?;
            match self
                .recognizer
                .recognize_chunk(&chunk_audio, language_code)
                .await
            {
                Ok(result) => states[chunk.index] = ChunkState::Succeeded(result),
                Err(e) => {
                    states[chunk.index] = ChunkState::Failed;
                    warn!(
                        "Chunk {} at offset {:.1}s failed: {}",
                        chunk.index, chunk.start_offset_seconds, e
                    );
                    return Err(e);
                }
            }
        }

        let raw: Vec<RecognitionResult> = states
            .into_iter()
            .filter_map(|state| match state {
                ChunkState::Succeeded(result) => Some(result),
                ChunkState::Pending | ChunkState::Failed => None,
            })
            .collect();

        let transcription = reconcile_transcript(&raw, language_code);
        info!(
            "Recognized {} chunk(s) into {} transcript chars",
            raw.len(),
            transcription.len()
        );

        Ok(SttOutcome {
            transcription,
            chunks_processed: raw.len(),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{DurationProber, Transcoder};
    use crate::error::OmsorgError;
    use crate::recognition::{ResultSegment, SpeechAlternative, WordInfo};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProber(f64);

    #[async_trait]
    impl DurationProber for FixedProber {
        async fn duration_seconds(&self, _path: &Path) -> Result<f64> {
            Ok(self.0)
        }
    }

    struct WritingTranscoder;

    #[async_trait]
    impl Transcoder for WritingTranscoder {
        async fn extract_chunk(
            &self,
            _source: &Path,
            dest: &Path,
            _start_seconds: f64,
            _duration_seconds: f64,
        ) -> Result<()> {
            tokio::fs::write(dest, b"flac").await?;
            Ok(())
        }
    }

    struct ScriptedRecognizer {
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
    }

    impl ScriptedRecognizer {
        fn new(fail_on_call: Option<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on_call,
            }
        }
    }

    #[async_trait]
    impl Recognizer for ScriptedRecognizer {
        async fn recognize_chunk(
            &self,
            _audio: &[u8],
            _language_code: &str,
        ) -> Result<RecognitionResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(call) == self.fail_on_call {
                return Err(OmsorgError::Recognition {
                    status: 400,
                    body: "bad chunk".into(),
                });
            }
            Ok(RecognitionResult {
                results: vec![ResultSegment {
                    alternatives: vec![SpeechAlternative {
                        transcript: String::new(),
                        words: vec![WordInfo {
                            word: format!("word{}", call),
                            speaker_tag: Some(1),
                        }],
                    }],
                }],
            })
        }
    }

    fn pipeline(
        duration: f64,
        recognizer: Arc<ScriptedRecognizer>,
        scratch_root: PathBuf,
    ) -> SttPipeline {
        SttPipeline::new(
            Arc::new(FixedProber(duration)),
            Arc::new(WritingTranscoder),
            recognizer,
        )
        .with_scratch_root(scratch_root)
    }

    fn scratch_entries(root: &Path) -> usize {
        std::fs::read_dir(root).unwrap().count()
    }

    #[tokio::test]
    async fn test_short_recording_issues_one_recognition_call() {
        let root = tempfile::tempdir().unwrap();
        let recognizer = Arc::new(ScriptedRecognizer::new(None));
        let outcome = pipeline(42.0, recognizer.clone(), root.path().to_path_buf())
            .run(b"audio", "en-US")
            .await
            .unwrap();

        assert_eq!(outcome.chunks_processed, 1);
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.transcription, "[speaker 1]: word0");
    }

    #[tokio::test]
    async fn test_long_recording_processes_chunks_in_order() {
        let root = tempfile::tempdir().unwrap();
        let recognizer = Arc::new(ScriptedRecognizer::new(None));
        let outcome = pipeline(130.0, recognizer.clone(), root.path().to_path_buf())
            .run(b"audio", "en-US")
            .await
            .unwrap();

        assert_eq!(outcome.chunks_processed, 3);
        assert_eq!(outcome.raw.len(), 3);
        // Same speaker throughout, so the words form one continuous run in
        // chunk order.
        assert_eq!(outcome.transcription, "[speaker 1]: word0 word1 word2");
    }

    #[tokio::test]
    async fn test_scratch_removed_after_success() {
        let root = tempfile::tempdir().unwrap();
        let recognizer = Arc::new(ScriptedRecognizer::new(None));
        pipeline(130.0, recognizer, root.path().to_path_buf())
            .run(b"audio", "en-US")
            .await
            .unwrap();

        assert_eq!(scratch_entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_chunk_failure_short_circuits_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let recognizer = Arc::new(ScriptedRecognizer::new(Some(1)));
        let err = pipeline(130.0, recognizer.clone(), root.path().to_path_buf())
            .run(b"audio", "en-US")
            .await
            .unwrap_err();

        assert!(matches!(err, OmsorgError::Recognition { status: 400, .. }));
        // Chunk 2 was never attempted after chunk 1 failed.
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(scratch_entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_probe_failure_cleans_up_scratch() {
        struct FailingProber;

        #[async_trait]
        impl DurationProber for FailingProber {
            async fn duration_seconds(&self, _path: &Path) -> Result<f64> {
                Err(OmsorgError::Probe("ffprobe returned error".into()))
            }
        }

        let root = tempfile::tempdir().unwrap();
        let pipeline = SttPipeline::new(
            Arc::new(FailingProber),
            Arc::new(WritingTranscoder),
            Arc::new(ScriptedRecognizer::new(None)),
        )
        .with_scratch_root(root.path().to_path_buf());

        let err = pipeline.run(b"audio", "en-US").await.unwrap_err();
        assert!(matches!(err, OmsorgError::Probe(_)));
        assert_eq!(scratch_entries(root.path()), 0);
    }
}
