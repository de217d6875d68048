//! Omsorg - Voice-Note Relay
//!
//! A backend relay that turns voice recordings into speaker-annotated
//! transcripts and structured elder-friendly reports.
//!
//! The name "Omsorg" comes from the Norwegian/Scandinavian word for "care."
//!
//! # Overview
//!
//! Omsorg exposes two HTTP endpoints to its UI collaborator:
//!
//! - `POST /stt` - normalize and chunk an uploaded recording, recognize
//!   each chunk (escalating to a long-running job when a chunk exceeds the
//!   synchronous ceiling), and reconcile the diarized word streams into one
//!   ordered transcript
//! - `POST /summary` - drive a schema-constrained generation call that
//!   turns a transcript into a fixed-shape clinical-style report
//!
//! Audio and transcripts are never persisted server-side; every request
//! owns a scratch directory that is removed on all exit paths.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Environment-derived configuration
//! - `audio` - Normalization, duration probing, and chunking
//! - `recognition` - Sync and long-running speech recognition
//! - `reconcile` - Diarized transcript reconciliation
//! - `summary` - Schema-constrained report generation
//! - `pipeline` - Per-request pipeline coordination
//! - `server` - The relay's HTTP endpoints

pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod recognition;
pub mod reconcile;
pub mod server;
pub mod summary;

pub use error::{OmsorgError, Result};
