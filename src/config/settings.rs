//! Configuration settings for Omsorg.
//!
//! All settings come from the environment and are read exactly once at
//! process start. A missing credential does not abort startup: the affected
//! endpoint answers with a permanent 500 until the process is restarted with
//! the variable set, so `from_env` is infallible.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub server: ServerSettings,
    pub recognition: RecognitionSettings,
    pub generation: GenerationSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 8787 }
    }
}

/// Speech-recognition service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// API key for the speech-recognition service.
    pub api_key: Option<String>,
    /// Wall-clock budget for the long-running poll loop, in seconds.
    pub poll_timeout_seconds: u64,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            poll_timeout_seconds: 180,
        }
    }
}

/// Generative summarization service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// API key for the generation service. Falls back to the recognition
    /// key when unset.
    pub api_key: Option<String>,
    /// Model identifier for report generation.
    pub model: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Self {
        let mut settings = Settings::default();

        if let Some(port) = read_var("PORT").and_then(|v| v.parse().ok()) {
            settings.server.port = port;
        }
        settings.recognition.api_key = read_var("SPEECH_API_KEY");
        if let Some(secs) = read_var("POLL_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
            settings.recognition.poll_timeout_seconds = secs;
        }
        settings.generation.api_key = read_var("GENERATION_API_KEY");
        if let Some(model) = read_var("GENERATION_MODEL") {
            settings.generation.model = model;
        }

        settings
    }

    /// Credential for the recognition service, if configured.
    pub fn speech_api_key(&self) -> Option<&str> {
        self.recognition.api_key.as_deref()
    }

    /// Credential for the generation service; falls back to the
    /// recognition credential when unset.
    pub fn generation_api_key(&self) -> Option<&str> {
        self.generation
            .api_key
            .as_deref()
            .or(self.recognition.api_key.as_deref())
    }
}

/// Read an environment variable, treating empty values as unset.
fn read_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
