//! The fixed-shape report produced from a transcript.
//!
//! Every field defaults to null/empty so a model that omits a detail never
//! has one fabricated for it on deserialization.

use serde::{Deserialize, Serialize};

/// Structured elder-friendly report generated from one transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryReport {
    pub diagnosis: Diagnosis,
    pub prohibitions: Vec<String>,
    pub danger_signs: Vec<String>,
    pub diet_advice: DietAdvice,
    pub follow_up: FollowUp,
    pub audio_summary: Option<String>,
}

/// Condition named in the consultation, with the stated reason.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Diagnosis {
    pub condition: Option<String>,
    pub reason: Option<String>,
}

/// Dietary guidance split into encouraged and discouraged items.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DietAdvice {
    pub good_to_eat: Vec<String>,
    pub avoid_eating: Vec<String>,
}

/// Follow-up appointment details, if any were mentioned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowUp {
    pub date_time: Option<String>,
    pub day_of_week: Option<String>,
    pub tasks: Vec<String>,
}
