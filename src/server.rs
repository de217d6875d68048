//! HTTP relay endpoints.
//!
//! Two entry points for the UI collaborator: `/stt` runs the
//! audio-to-transcript pipeline, `/summary` turns a transcript into a
//! structured report. A missing upstream credential degrades the matching
//! endpoint to a permanent 500 rather than failing startup.

use crate::config::Settings;
use crate::error::OmsorgError;
use crate::pipeline::SttPipeline;
use crate::recognition::{RecognitionResult, SpeechClient};
use crate::summary::{anchor_date_string, GeminiGenerator, ReportGenerator, SummaryReport};
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

const DEFAULT_LANGUAGE_CODE: &str = "en-US";
const DEFAULT_ELDER_TITLE: &str = "長輩";

/// Shared application state.
pub struct AppState {
    /// Present only when the recognition credential is configured.
    pub pipeline: Option<SttPipeline>,
    /// Present only when a generation credential is configured.
    pub generator: Option<Arc<dyn ReportGenerator>>,
    /// Model identifier echoed in `/summary` responses.
    pub model: String,
}

impl AppState {
    /// Build state from settings, wiring the real ffmpeg/ffprobe binaries
    /// and upstream clients.
    pub fn from_settings(settings: &Settings) -> crate::error::Result<Self> {
        use crate::audio::{FfmpegTranscoder, FfprobeProber};

        let pipeline = match settings.speech_api_key() {
            Some(key) => {
                let client = SpeechClient::new(
                    key,
                    Duration::from_secs(settings.recognition.poll_timeout_seconds),
                )?;
                Some(SttPipeline::new(
                    Arc::new(FfprobeProber),
                    Arc::new(FfmpegTranscoder),
                    Arc::new(client),
                ))
            }
            None => None,
        };

        let generator: Option<Arc<dyn ReportGenerator>> = match settings.generation_api_key() {
            Some(key) => Some(Arc::new(GeminiGenerator::new(
                key,
                &settings.generation.model,
            )?)),
            None => None,
        };

        Ok(Self {
            pipeline,
            generator,
            model: settings.generation.model.clone(),
        })
    }
}

/// Build the relay router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/stt", post(stt))
        .route("/summary", post(summary))
        .layer(cors)
        .with_state(state)
}

/// Run the relay server until shutdown.
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_settings(&settings)?);
    if state.pipeline.is_none() {
        error!("SPEECH_API_KEY is not set; /stt will answer 500 until restart");
    }
    if state.generator.is_none() {
        error!("No generation credential; /summary will answer 500 until restart");
    }

    let app = router(state);
    let addr = format!("0.0.0.0:{}", settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Relay listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SttRequest {
    /// Base64 audio payload, no data-URI prefix.
    #[serde(default)]
    audio_base64: Option<String>,
    #[serde(default)]
    language_code: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SttResponse {
    transcription: String,
    chunks_processed: usize,
    raw: Vec<RecognitionResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryRequest {
    #[serde(default)]
    transcription: Option<String>,
    #[serde(default)]
    elder_title: Option<String>,
}

#[derive(Serialize)]
struct SummaryResponse {
    current_date: String,
    model: String,
    summary: SummaryReport,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

async fn stt(State(state): State<Arc<AppState>>, Json(req): Json<SttRequest>) -> Response {
    let Some(pipeline) = &state.pipeline else {
        return error_response(&OmsorgError::Config(
            "Speech recognition credential is not configured".into(),
        ));
    };

    let encoded = match req.audio_base64.as_deref() {
        Some(s) if !s.trim().is_empty() => s,
        _ => {
            return error_response(&OmsorgError::Validation(
                "Missing required field: audioBase64".into(),
            ));
        }
    };

    let audio = match BASE64_STANDARD.decode(encoded.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            return error_response(&OmsorgError::Validation(format!(
                "audioBase64 is not valid base64: {e}"
            )));
        }
    };

    let language_code = req
        .language_code
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_LANGUAGE_CODE);

    match pipeline.run(&audio, language_code).await {
        Ok(outcome) => Json(SttResponse {
            transcription: outcome.transcription,
            chunks_processed: outcome.chunks_processed,
            raw: outcome.raw,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn summary(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummaryRequest>,
) -> Response {
    let Some(generator) = &state.generator else {
        return error_response(&OmsorgError::Config(
            "Generation credential is not configured".into(),
        ));
    };

    let transcription = match req.transcription.as_deref() {
        Some(s) if !s.trim().is_empty() => s,
        _ => {
            return error_response(&OmsorgError::Validation(
                "Missing required field: transcription".into(),
            ));
        }
    };

    let elder_title = req
        .elder_title
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_ELDER_TITLE);

    match generator.generate_report(transcription, elder_title).await {
        Ok(summary) => Json(SummaryResponse {
            current_date: anchor_date_string(),
            model: state.model.clone(),
            summary,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Translate a pipeline error into the relay's JSON error body.
///
/// Upstream rejections pass their payload through when it is itself JSON;
/// everything else is wrapped as `{"error": {"message": ...}}`.
fn error_response(err: &OmsorgError) -> Response {
    let body = match err {
        OmsorgError::SchemaParse { message, excerpt } => serde_json::json!({
            "error": { "message": message, "excerpt": excerpt }
        }),
        OmsorgError::Recognition { body, .. } | OmsorgError::Generation { body, .. } => {
            serde_json::from_str::<serde_json::Value>(body).unwrap_or_else(|_| {
                serde_json::json!({ "error": { "message": err.to_string() } })
            })
        }
        other => serde_json::json!({
            "error": { "message": other.to_string() }
        }),
    };
    (err.status_code(), Json(body)).into_response()
}
