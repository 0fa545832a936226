//! Event types for the ILDHVP event stream

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// ILDHVP event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IldEvent {
    /// A grade write changed a section's progress
    SectionProgressUpdated {
        user_id: i64,
        section_id: i64,
        percentage: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A stored grade improved
    GradeRecorded {
        user_id: i64,
        content_id: i64,
        score: f64,
        max_score: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A scoring session produced a result that could not be stored
    ResultPersistFailed {
        session_id: Uuid,
        user_id: i64,
        content_id: i64,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl IldEvent {
    /// SSE event name (the variant name)
    pub fn event_type(&self) -> &'static str {
        match self {
            IldEvent::SectionProgressUpdated { .. } => "SectionProgressUpdated",
            IldEvent::GradeRecorded { .. } => "GradeRecorded",
            IldEvent::ResultPersistFailed { .. } => "ResultPersistFailed",
        }
    }

    /// User the event concerns, if it is user-scoped
    pub fn user_id(&self) -> Option<i64> {
        match self {
            IldEvent::SectionProgressUpdated { user_id, .. }
            | IldEvent::GradeRecorded { user_id, .. }
            | IldEvent::ResultPersistFailed { user_id, .. } => Some(*user_id),
        }
    }
}
