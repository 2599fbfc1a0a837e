use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::escalation::EscalationCause;
use crate::intent::ResolvedIntent;

/// Escalation state machine. `Escalated` is terminal for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionPhase {
    Normal,
    Escalated { cause: EscalationCause },
}

/// Per-session conversation state.
///
/// Mutated once per accepted request, either through [`SessionState::record`]
/// (the request stayed in `Normal`) or [`SessionState::escalate`].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionState {
    pub session_id: String,
    pub history: Vec<ResolvedIntent>,
    /// Consecutive fallback resolutions. Only grows until a non-fallback
    /// resolution, an escalation or an explicit reset.
    pub fallback_count: u32,
    pub phase: SessionPhase,
    pub opened_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            history: Vec::new(),
            fallback_count: 0,
            phase: SessionPhase::Normal,
            opened_at: Utc::now(),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.phase, SessionPhase::Escalated { .. })
    }

    pub fn turns(&self) -> usize {
        self.history.len()
    }

    /// Fallback streak if `resolved` were recorded.
    pub fn prospective_fallback_count(&self, resolved: &ResolvedIntent) -> u32 {
        if resolved.is_fallback() {
            self.fallback_count.saturating_add(1)
        } else {
            0
        }
    }

    /// Length of the trailing run of `resolved.intent` if `resolved` were
    /// recorded. Fallback resolutions never form a run.
    pub fn prospective_repeat_count(&self, resolved: &ResolvedIntent) -> u32 {
        if resolved.is_fallback() {
            return 0;
        }
        let trailing = self
            .history
            .iter()
            .rev()
            .take_while(|past| !past.is_fallback() && past.intent == resolved.intent)
            .count();
        u32::try_from(trailing).unwrap_or(u32::MAX).saturating_add(1)
    }

    /// Apply a request that did not escalate.
    pub fn record(&mut self, resolved: ResolvedIntent) {
        self.fallback_count = self.prospective_fallback_count(&resolved);
        self.history.push(resolved);
    }

    /// Apply a request that escalated. The resolution is kept in the history
    /// for the trace; counters are left as they were.
    pub fn escalate(&mut self, resolved: ResolvedIntent, cause: EscalationCause) {
        self.history.push(resolved);
        self.phase = SessionPhase::Escalated { cause };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{ConfidenceTier, Severity};

    fn resolution(intent: &str, confidence: ConfidenceTier) -> ResolvedIntent {
        ResolvedIntent {
            intent: intent.to_string(),
            severity: Severity::Low,
            confidence,
        }
    }

    #[test]
    fn fallback_counter_only_increases_until_success() {
        let mut session = SessionState::new("s-1");
        let mut last = 0;
        for _ in 0..5 {
            session.record(resolution("general", ConfidenceTier::Fallback));
            assert!(session.fallback_count > last);
            last = session.fallback_count;
        }
        session.record(resolution("billing", ConfidenceTier::High));
        assert_eq!(session.fallback_count, 0);
    }

    #[test]
    fn security_override_resets_fallback_counter() {
        let mut session = SessionState::new("s-1");
        session.record(resolution("general", ConfidenceTier::Fallback));
        session.record(resolution("general", ConfidenceTier::SecurityOverride));
        assert_eq!(session.fallback_count, 0);
    }

    #[test]
    fn repeat_count_stops_at_different_intent() {
        let mut session = SessionState::new("s-1");
        session.record(resolution("billing", ConfidenceTier::High));
        session.record(resolution("shipping", ConfidenceTier::High));
        session.record(resolution("billing", ConfidenceTier::Medium));

        let billing = resolution("billing", ConfidenceTier::High);
        assert_eq!(session.prospective_repeat_count(&billing), 2);
        let shipping = resolution("shipping", ConfidenceTier::High);
        assert_eq!(session.prospective_repeat_count(&shipping), 1);
    }

    #[test]
    fn repeat_count_ignores_fallback_runs() {
        let mut session = SessionState::new("s-1");
        session.record(resolution("general", ConfidenceTier::Fallback));
        session.record(resolution("general", ConfidenceTier::Fallback));
        assert_eq!(
            session.prospective_repeat_count(&resolution("general", ConfidenceTier::Fallback)),
            0
        );
        assert_eq!(
            session.prospective_repeat_count(&resolution("general", ConfidenceTier::High)),
            1
        );
    }

    #[test]
    fn escalation_is_terminal() {
        let mut session = SessionState::new("s-1");
        assert!(!session.is_closed());
        session.escalate(
            resolution("billing", ConfidenceTier::High),
            EscalationCause::HighSeverity,
        );
        assert!(session.is_closed());
        assert_eq!(
            session.phase,
            SessionPhase::Escalated {
                cause: EscalationCause::HighSeverity
            }
        );
        assert_eq!(session.turns(), 1);
    }
}
