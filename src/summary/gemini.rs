//! Gemini-backed report generation.

use super::report::SummaryReport;
use super::ReportGenerator;
use crate::error::{OmsorgError, Result};
use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Per-call transport timeout for generation requests.
const TRANSPORT_TIMEOUT_SECS: u64 = 30;

/// Fixed timezone used to anchor relative follow-up dates.
pub const REPORT_TIMEZONE_OFFSET_HOURS: i32 = 8;

/// Longest raw-output excerpt kept when schema parsing fails.
const EXCERPT_CHARS: usize = 300;

/// Client for schema-constrained report generation.
pub struct GeminiGenerator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGenerator {
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(TRANSPORT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API base (used by tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Model identifier this generator was configured with.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl ReportGenerator for GeminiGenerator {
    #[instrument(skip(self, transcript), fields(model = %self.model, chars = transcript.len()))]
    async fn generate_report(
        &self,
        transcript: &str,
        elder_title: &str,
    ) -> Result<SummaryReport> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let body = json!({
            "contents": [{
                "parts": [{ "text": build_instruction(transcript, elder_title) }]
            }],
            "generationConfig": {
                "temperature": 0.2,
                "responseMimeType": "application/json",
                "responseSchema": report_schema(),
            }
        });

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OmsorgError::Generation {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        let raw = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| {
                OmsorgError::Protocol("Generation response carried no candidate text".into())
            })?;

        debug!("Generation returned {} chars", raw.len());
        parse_report(raw)
    }
}

/// Parse model output as a report, keeping a bounded excerpt on failure.
pub fn parse_report(raw: &str) -> Result<SummaryReport> {
    serde_json::from_str(raw).map_err(|e| OmsorgError::SchemaParse {
        message: e.to_string(),
        excerpt: raw.chars().take(EXCERPT_CHARS).collect(),
    })
}

/// Anchor date for resolving relative follow-up dates, in the fixed
/// report timezone.
pub fn anchor_date_string() -> String {
    let offset = FixedOffset::east_opt(REPORT_TIMEZONE_OFFSET_HOURS * 3600)
        .expect("valid fixed offset");
    Utc::now().with_timezone(&offset).format("%Y-%m-%d").to_string()
}

/// Natural-language instruction sent alongside the transcript.
fn build_instruction(transcript: &str, elder_title: &str) -> String {
    format!(
        "You are preparing a spoken-style medical visit summary for {elder_title}, \
         an elderly listener. Today's date is {today}; resolve any relative dates \
         (like \"next Tuesday\") against it.\n\
         \n\
         Rules:\n\
         - Respond in Traditional Chinese, in plain everyday words. Avoid medical \
           jargon; when a clinical term is unavoidable, explain it simply.\n\
         - Use ONLY information grounded in the transcript below. If a field was \
           not mentioned, leave it null (or an empty list). Never invent a \
           diagnosis, date, or instruction.\n\
         - Fill exactly these six fields: diagnosis (condition, reason), \
           prohibitions, danger_signs, diet_advice (good_to_eat, avoid_eating), \
           follow_up (date_time, day_of_week, tasks), audio_summary.\n\
         - audio_summary is a short warm spoken paragraph addressed to \
           {elder_title}, suitable for reading aloud.\n\
         \n\
         Transcript:\n{transcript}",
        elder_title = elder_title,
        today = anchor_date_string(),
        transcript = transcript,
    )
}

/// Declared output schema enforced by the service's constrained mode.
fn report_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "diagnosis": {
                "type": "OBJECT",
                "properties": {
                    "condition": { "type": "STRING", "nullable": true },
                    "reason": { "type": "STRING", "nullable": true }
                }
            },
            "prohibitions": {
                "type": "ARRAY",
                "items": { "type": "STRING" }
            },
            "danger_signs": {
                "type": "ARRAY",
                "items": { "type": "STRING" }
            },
            "diet_advice": {
                "type": "OBJECT",
                "properties": {
                    "good_to_eat": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "avoid_eating": { "type": "ARRAY", "items": { "type": "STRING" } }
                }
            },
            "follow_up": {
                "type": "OBJECT",
                "properties": {
                    "date_time": { "type": "STRING", "nullable": true },
                    "day_of_week": { "type": "STRING", "nullable": true },
                    "tasks": { "type": "ARRAY", "items": { "type": "STRING" } }
                }
            },
            "audio_summary": { "type": "STRING", "nullable": true }
        },
        "required": ["diagnosis", "prohibitions", "danger_signs", "diet_advice", "follow_up", "audio_summary"]
    })
}
