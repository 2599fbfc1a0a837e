use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::escalation::{ActionKind, EscalationCause};
use crate::intent::{ConfidenceTier, Severity};

/// Milliseconds with two decimals, the resolution traces are reported in.
pub fn millis(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 100_000.0).round() / 100.0
}

/// Per-stage latency in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StageLatencies {
    pub knowledge_search: f64,
    pub intent_resolution: f64,
    pub generation: f64,
    /// Absent when no action ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<f64>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    NotTriggered,
    Created { action: ActionKind, ticket_id: String },
    Failed { action: ActionKind, error: String },
}

impl ActionOutcome {
    pub fn was_attempted(&self) -> bool {
        !matches!(self, ActionOutcome::NotTriggered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Generated,
    /// The generator failed and the persona's fallback template was used.
    Fallback { error: String },
}

/// One record per handled request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Trace {
    pub request_id: Uuid,
    pub session_id: String,
    pub recorded_at: DateTime<Utc>,
    pub intent: String,
    pub confidence: ConfidenceTier,
    pub severity: Severity,
    pub knowledge_matches: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_entry_id: Option<String>,
    /// Category guidance was used because the query matched no entry.
    pub fallback_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationCause>,
    pub action_taken: bool,
    pub action: ActionOutcome,
    pub generation: GenerationOutcome,
    pub latency_ms: StageLatencies,
}

/// Record for a request turned away before any stage ran: an empty query or
/// a closed session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RejectedTrace {
    pub request_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
    /// Machine code from [`crate::error::codes`].
    pub rejection: String,
    /// Cause of the escalation that closed the session, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationCause>,
    pub total_ms: f64,
}
