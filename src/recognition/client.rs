//! REST client for the speech-recognition service.

use super::models::{
    Operation, RecognitionAudio, RecognitionConfig, RecognitionResult, RecognizeRequest,
};
use super::Recognizer;
use crate::error::{OmsorgError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const DEFAULT_BASE_URL: &str = "https://speech.googleapis.com/v1";

/// Per-call transport timeout for every HTTP request this client makes.
const TRANSPORT_TIMEOUT_SECS: u64 = 30;

/// Rejection-message substrings that mean "input too long for a sync call".
///
/// The upstream error text is not a stable contract; if recognition starts
/// failing outright instead of escalating, check these against the current
/// service messages first.
pub const SYNC_TOO_LONG_MARKERS: &[&str] = &[
    "sync input too long",
    "exceeds duration limit",
];

/// Successive poll delays; the last value holds once the schedule is spent.
const POLL_BACKOFF_MS: &[u64] = &[500, 1000, 1500, 2000, 2500, 3000];

/// Client for the speech-recognition REST API.
pub struct SpeechClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    poll_timeout: Duration,
}

impl SpeechClient {
    /// Create a client with the given credential and long-running poll budget.
    pub fn new(api_key: &str, poll_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(TRANSPORT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_timeout,
        })
    }

    /// Point the client at a different API base (used by tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Attempt one synchronous recognition call.
    ///
    /// `Ok(Ok(..))` is a recognition result, `Ok(Err(body))` is the narrow
    /// "too long for sync" rejection, and `Err` is any other failure.
    async fn recognize_sync(
        &self,
        request: &RecognizeRequest,
    ) -> Result<std::result::Result<RecognitionResult, String>> {
        let url = format!("{}/speech:recognize?key={}", self.base_url, self.api_key);
        let response = self.http.post(&url).json(request).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(Ok(response.json().await?));
        }

        let body = response.text().await.unwrap_or_default();
        if is_sync_too_long(&body) {
            return Ok(Err(body));
        }

        Err(OmsorgError::Recognition {
            status: status.as_u16(),
            body,
        })
    }

    /// Submit a long-running recognition job and return its operation name.
    async fn submit_long_running(&self, request: &RecognizeRequest) -> Result<String> {
        let url = format!(
            "{}/speech:longrunningrecognize?key={}",
            self.base_url, self.api_key
        );
        let response = self.http.post(&url).json(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OmsorgError::Recognition {
                status: status.as_u16(),
                body,
            });
        }

        let operation: Operation = response.json().await?;
        operation
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                OmsorgError::Protocol("Long-running submission returned no operation name".into())
            })
    }

    /// Fetch the current state of a long-running operation.
    async fn poll_operation(&self, name: &str) -> Result<Operation> {
        let url = format!("{}/operations/{}?key={}", self.base_url, name, self.api_key);
        let response = self.http.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OmsorgError::Recognition {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Poll an operation to completion under the wall-clock budget.
    async fn await_operation(&self, name: &str) -> Result<RecognitionResult> {
        let started = tokio::time::Instant::now();
        let mut attempt = 0usize;

        loop {
            if started.elapsed() >= self.poll_timeout {
                return Err(OmsorgError::Timeout(format!(
                    "Long-running recognition exceeded {}s budget",
                    self.poll_timeout.as_secs()
                )));
            }

            tokio::time::sleep(backoff_delay(attempt)).await;
            attempt += 1;

            // The sleep itself may carry us past the budget; never issue a
            // poll after the deadline.
            if started.elapsed() >= self.poll_timeout {
                return Err(OmsorgError::Timeout(format!(
                    "Long-running recognition exceeded {}s budget",
                    self.poll_timeout.as_secs()
                )));
            }

            let operation = self.poll_operation(name).await?;
            if !operation.done {
                debug!("Operation {} still running after poll {}", name, attempt);
                continue;
            }

            if let Some(err) = operation.error {
                return Err(OmsorgError::Recognition {
                    status: 502,
                    body: format!("Operation failed ({}): {}", err.code, err.message),
                });
            }

            return operation.response.ok_or_else(|| {
                OmsorgError::Protocol("Completed operation carried no response payload".into())
            });
        }
    }
}

#[async_trait]
impl Recognizer for SpeechClient {
    #[instrument(skip(self, audio), fields(bytes = audio.len(), language = language_code))]
    async fn recognize_chunk(
        &self,
        audio: &[u8],
        language_code: &str,
    ) -> Result<RecognitionResult> {
        let request = RecognizeRequest {
            config: RecognitionConfig::for_language(language_code),
            audio: RecognitionAudio {
                content: BASE64_STANDARD.encode(audio),
            },
        };

        match self.recognize_sync(&request).await? {
            Ok(result) => Ok(result),
            Err(rejection) => {
                warn!("Sync recognition rejected as too long, escalating: {}", rejection);
                let name = self.submit_long_running(&request).await?;
                info!("Polling long-running operation {}", name);
                self.await_operation(&name).await
            }
        }
    }
}

/// Whether an upstream rejection body names the sync-duration ceiling.
pub fn is_sync_too_long(body: &str) -> bool {
    let lowered = body.to_lowercase();
    SYNC_TOO_LONG_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Delay before poll `attempt` (0-based); holds at the last schedule value.
fn backoff_delay(attempt: usize) -> Duration {
    let ms = POLL_BACKOFF_MS[attempt.min(POLL_BACKOFF_MS.len() - 1)];
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeSpeech {
        sync_status: u16,
        sync_body: String,
        operation_polls_until_done: usize,
        sync_calls: AtomicUsize,
        long_running_calls: AtomicUsize,
        poll_calls: AtomicUsize,
    }

    async fn fake_sync(State(state): State<Arc<FakeSpeech>>) -> (StatusCode, String) {
        state.sync_calls.fetch_add(1, Ordering::SeqCst);
        (
            StatusCode::from_u16(state.sync_status).unwrap(),
            state.sync_body.clone(),
        )
    }

    async fn fake_long_running(
        State(state): State<Arc<FakeSpeech>>,
    ) -> Json<serde_json::Value> {
        state.long_running_calls.fetch_add(1, Ordering::SeqCst);
        Json(serde_json::json!({ "name": "op-test" }))
    }

    async fn fake_poll(State(state): State<Arc<FakeSpeech>>) -> Json<serde_json::Value> {
        let polls = state.poll_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if polls < state.operation_polls_until_done {
            Json(serde_json::json!({ "name": "op-test", "done": false }))
        } else {
            Json(serde_json::json!({
                "name": "op-test",
                "done": true,
                "response": {
                    "results": [
                        {"alternatives": [{"transcript": "from long running"}]}
                    ]
                }
            }))
        }
    }

    async fn serve_fake(state: Arc<FakeSpeech>) -> String {
        let app = Router::new()
            .route("/v1/speech:recognize", post(fake_sync))
            .route("/v1/speech:longrunningrecognize", post(fake_long_running))
            .route("/v1/operations/op-test", get(fake_poll))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    fn client(base_url: &str, poll_timeout: Duration) -> SpeechClient {
        SpeechClient::new("test-key", poll_timeout)
            .unwrap()
            .with_base_url(base_url)
    }

    #[test]
    fn test_too_long_marker_matching() {
        assert!(is_sync_too_long("Sync input too long. Use async."));
        assert!(is_sync_too_long(
            r#"{"error": {"message": "Request payload exceeds duration limit"}}"#
        ));
        assert!(!is_sync_too_long("Invalid audio encoding"));
        assert!(!is_sync_too_long(""));
    }

    #[test]
    fn test_backoff_schedule_holds_at_last_value() {
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
        assert_eq!(backoff_delay(3), Duration::from_millis(2000));
        assert_eq!(backoff_delay(5), Duration::from_millis(3000));
        assert_eq!(backoff_delay(6), Duration::from_millis(3000));
        assert_eq!(backoff_delay(100), Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn test_sync_success_makes_no_long_running_calls() {
        let state = Arc::new(FakeSpeech {
            sync_status: 200,
            sync_body: r#"{"results": [{"alternatives": [{"transcript": "hi"}]}]}"#.into(),
            ..Default::default()
        });
        let base = serve_fake(state.clone()).await;

        let result = client(&base, Duration::from_secs(10))
            .recognize_chunk(b"flac-bytes", "en-US")
            .await
            .unwrap();

        assert_eq!(result.results[0].best().unwrap().transcript, "hi");
        assert_eq!(state.sync_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.long_running_calls.load(Ordering::SeqCst), 0);
        assert_eq!(state.poll_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_too_long_rejection_escalates_once_and_polls() {
        let state = Arc::new(FakeSpeech {
            sync_status: 400,
            sync_body: r#"{"error": {"message": "Sync input too long."}}"#.into(),
            operation_polls_until_done: 2,
            ..Default::default()
        });
        let base = serve_fake(state.clone()).await;

        let result = client(&base, Duration::from_secs(30))
            .recognize_chunk(b"flac-bytes", "en-US")
            .await
            .unwrap();

        assert_eq!(
            result.results[0].best().unwrap().transcript,
            "from long running"
        );
        assert_eq!(state.long_running_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.poll_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_rejection_propagates_without_escalation() {
        let state = Arc::new(FakeSpeech {
            sync_status: 400,
            sync_body: r#"{"error": {"message": "Invalid audio encoding"}}"#.into(),
            ..Default::default()
        });
        let base = serve_fake(state.clone()).await;

        let err = client(&base, Duration::from_secs(10))
            .recognize_chunk(b"flac-bytes", "en-US")
            .await
            .unwrap_err();

        match err {
            OmsorgError::Recognition { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("Invalid audio encoding"));
            }
            other => panic!("expected Recognition error, got {:?}", other),
        }
        assert_eq!(state.long_running_calls.load(Ordering::SeqCst), 0);
        assert_eq!(state.poll_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausted_budget_times_out_without_polling() {
        let state = Arc::new(FakeSpeech {
            sync_status: 400,
            sync_body: "Sync input too long".into(),
            operation_polls_until_done: usize::MAX,
            ..Default::default()
        });
        let base = serve_fake(state.clone()).await;

        // Zero budget: the loop must fail before issuing a single poll.
        let err = client(&base, Duration::ZERO)
            .recognize_chunk(b"flac-bytes", "en-US")
            .await
            .unwrap_err();

        assert!(matches!(err, OmsorgError::Timeout(_)));
        assert_eq!(state.long_running_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.poll_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_budget_expiring_during_backoff_stops_polling() {
        let state = Arc::new(FakeSpeech {
            sync_status: 400,
            sync_body: "Sync input too long".into(),
            operation_polls_until_done: usize::MAX,
            ..Default::default()
        });
        let base = serve_fake(state.clone()).await;

        // Budget covers the first 500ms backoff but expires during the
        // second (1000ms) sleep: exactly one poll, none after the deadline.
        let err = client(&base, Duration::from_millis(600))
            .recognize_chunk(b"flac-bytes", "en-US")
            .await
            .unwrap_err();

        assert!(matches!(err, OmsorgError::Timeout(_)));
        assert_eq!(state.poll_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_operation_error_surfaces_as_recognition_error() {
        async fn failing_poll() -> Json<serde_json::Value> {
            Json(serde_json::json!({
                "name": "op-test",
                "done": true,
                "error": { "code": 3, "message": "audio decode failed" }
            }))
        }

        let state = Arc::new(FakeSpeech {
            sync_status: 400,
            sync_body: "Sync input too long".into(),
            ..Default::default()
        });
        let app = Router::new()
            .route("/v1/speech:recognize", post(fake_sync))
            .route("/v1/speech:longrunningrecognize", post(fake_long_running))
            .route("/v1/operations/op-test", get(failing_poll))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let err = client(&format!("http://{}/v1", addr), Duration::from_secs(30))
            .recognize_chunk(b"flac-bytes", "en-US")
            .await
            .unwrap_err();

        match err {
            OmsorgError::Recognition { body, .. } => {
                assert!(body.contains("audio decode failed"));
            }
            other => panic!("expected Recognition error, got {:?}", other),
        }
    }
}
