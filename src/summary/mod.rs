//! Schema-constrained report summarization.
//!
//! Turns a reconciled transcript into a fixed-shape elder-friendly report
//! by driving a generative text service in its schema-constrained output
//! mode. The service enforces the declared shape; the client still parses
//! the returned text and treats malformed output as its own error class,
//! with a bounded raw excerpt kept for diagnosis.

mod gemini;
mod report;

pub use gemini::{anchor_date_string, GeminiGenerator, REPORT_TIMEZONE_OFFSET_HOURS};
pub use report::{DietAdvice, Diagnosis, FollowUp, SummaryReport};

use crate::error::Result;
use async_trait::async_trait;

/// Trait for structured report generation.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// Generate a report from a transcript, addressed to the given
    /// listener display name.
    async fn generate_report(&self, transcript: &str, elder_title: &str)
        -> Result<SummaryReport>;
}
