use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::intent::{ResolvedIntent, Severity, lowercase_phrases};
use crate::session::SessionState;

/// Phrases that count as an explicit request for a human when the actions
/// document does not list its own.
pub const DEFAULT_EXPLICIT_PHRASES: [&str; 8] = [
    "human",
    "agent",
    "representative",
    "real person",
    "talk to someone",
    "create ticket",
    "raise a ticket",
    "contact support",
];

pub const DEFAULT_FALLBACK_THRESHOLD: u32 = 2;
pub const DEFAULT_REPEAT_THRESHOLD: u32 = 3;

/// Side-effecting actions a rule may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    #[default]
    CreateTicket,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::CreateTicket => "create_ticket",
        }
    }
}

/// Why a session escalated. Declaration order is the evaluation order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EscalationCause {
    ExplicitRequest,
    HighSeverity,
    RepeatedFailure,
    RepeatedIntent,
}

impl EscalationCause {
    pub fn as_str(self) -> &'static str {
        match self {
            EscalationCause::ExplicitRequest => "explicit_request",
            EscalationCause::HighSeverity => "high_severity",
            EscalationCause::RepeatedFailure => "repeated_failure",
            EscalationCause::RepeatedIntent => "repeated_intent",
        }
    }
}

/// One entry of the `rules` list in `actions.yaml`, tagged by `trigger`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum ActionRule {
    /// Query contains one of the explicit escalation phrases.
    ExplicitRequest {
        #[serde(default)]
        action: ActionKind,
    },
    /// Resolved intent severity is at least `min_severity`.
    HighSeverity {
        #[serde(default = "default_min_severity")]
        min_severity: Severity,
        #[serde(default)]
        action: ActionKind,
    },
    /// Consecutive fallback resolutions, including the current one.
    #[serde(alias = "low_confidence")]
    RepeatedFailure {
        #[serde(default = "default_fallback_threshold")]
        threshold: u32,
        #[serde(default)]
        action: ActionKind,
    },
    /// Consecutive resolutions of the same intent, including the current one.
    RepeatedIntent {
        #[serde(default = "default_repeat_threshold")]
        threshold: u32,
        #[serde(default)]
        action: ActionKind,
    },
}

fn default_min_severity() -> Severity {
    Severity::High
}

fn default_fallback_threshold() -> u32 {
    DEFAULT_FALLBACK_THRESHOLD
}

fn default_repeat_threshold() -> u32 {
    DEFAULT_REPEAT_THRESHOLD
}

impl ActionRule {
    pub fn cause(&self) -> EscalationCause {
        match self {
            ActionRule::ExplicitRequest { .. } => EscalationCause::ExplicitRequest,
            ActionRule::HighSeverity { .. } => EscalationCause::HighSeverity,
            ActionRule::RepeatedFailure { .. } => EscalationCause::RepeatedFailure,
            ActionRule::RepeatedIntent { .. } => EscalationCause::RepeatedIntent,
        }
    }

    pub fn action(&self) -> ActionKind {
        match self {
            ActionRule::ExplicitRequest { action }
            | ActionRule::HighSeverity { action, .. }
            | ActionRule::RepeatedFailure { action, .. }
            | ActionRule::RepeatedIntent { action, .. } => *action,
        }
    }

    pub fn threshold(&self) -> Option<u32> {
        match self {
            ActionRule::RepeatedFailure { threshold, .. }
            | ActionRule::RepeatedIntent { threshold, .. } => Some(*threshold),
            _ => None,
        }
    }
}

pub fn default_rules() -> Vec<ActionRule> {
    vec![
        ActionRule::ExplicitRequest {
            action: ActionKind::CreateTicket,
        },
        ActionRule::HighSeverity {
            min_severity: Severity::High,
            action: ActionKind::CreateTicket,
        },
        ActionRule::RepeatedFailure {
            threshold: DEFAULT_FALLBACK_THRESHOLD,
            action: ActionKind::CreateTicket,
        },
        ActionRule::RepeatedIntent {
            threshold: DEFAULT_REPEAT_THRESHOLD,
            action: ActionKind::CreateTicket,
        },
    ]
}

fn default_explicit_phrases() -> Vec<String> {
    DEFAULT_EXPLICIT_PHRASES.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    #[serde(default = "default_explicit_phrases")]
    pub explicit_phrases: Vec<String>,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            explicit_phrases: default_explicit_phrases(),
        }
    }
}

/// Descriptive entry for an action, surfaced through `config://actions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDescriptor {
    #[serde(default)]
    pub description: String,
}

/// The `actions.yaml` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default = "default_rules")]
    pub rules: Vec<ActionRule>,
    #[serde(default)]
    pub actions: std::collections::BTreeMap<String, ActionDescriptor>,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            escalation: EscalationConfig::default(),
            rules: default_rules(),
            actions: Default::default(),
        }
    }
}

/// Outcome of evaluating the policy for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Escalate {
        cause: EscalationCause,
        action: ActionKind,
    },
}

impl Decision {
    pub fn cause(&self) -> Option<EscalationCause> {
        match self {
            Decision::Continue => None,
            Decision::Escalate { cause, .. } => Some(*cause),
        }
    }
}

/// Deterministic escalation rules.
///
/// Rules are held in fixed precedence order (explicit request, severity,
/// repeated failure, repeated intent) whatever order the document lists them
/// in; rules of the same kind keep their document order.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    explicit_phrases: Vec<String>,
    rules: Vec<ActionRule>,
}

impl EscalationPolicy {
    pub fn new(config: &ActionsConfig) -> Self {
        let mut rules = config.rules.clone();
        rules.sort_by_key(ActionRule::cause);
        Self {
            explicit_phrases: lowercase_phrases(&config.escalation.explicit_phrases),
            rules,
        }
    }

    pub fn rules(&self) -> &[ActionRule] {
        &self.rules
    }

    pub fn is_explicit_request(&self, query: &str) -> bool {
        let q = query.to_lowercase();
        self.explicit_phrases.iter().any(|p| q.contains(p.as_str()))
    }

    /// Evaluate the rules for `resolved` against the session as it stood
    /// before this request. Pure: the caller applies the outcome.
    pub fn evaluate(&self, query: &str, resolved: &ResolvedIntent, session: &SessionState) -> Decision {
        for rule in &self.rules {
            let fired = match rule {
                ActionRule::ExplicitRequest { .. } => self.is_explicit_request(query),
                ActionRule::HighSeverity { min_severity, .. } => resolved.severity >= *min_severity,
                ActionRule::RepeatedFailure { threshold, .. } => {
                    session.prospective_fallback_count(resolved) >= *threshold
                }
                ActionRule::RepeatedIntent { threshold, .. } => {
                    session.prospective_repeat_count(resolved) >= *threshold
                }
            };
            if fired {
                return Decision::Escalate {
                    cause: rule.cause(),
                    action: rule.action(),
                };
            }
        }
        Decision::Continue
    }
}
