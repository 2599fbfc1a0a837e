use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use helpdesk_core::escalation::{Decision, EscalationCause, EscalationPolicy};
use helpdesk_core::intent::ResolvedIntent;
use helpdesk_core::session::SessionState;

pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("session '{session_id}' is closed")]
pub struct SessionClosed {
    pub session_id: String,
    /// `None` when the session was closed explicitly.
    pub cause: Option<EscalationCause>,
}

/// What one accepted request did to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    pub decision: Decision,
    /// Fallback streak after this request (unchanged on escalation).
    pub fallback_count: u32,
    /// Number of requests the session has accepted, this one included.
    pub turn: usize,
}

#[derive(Debug)]
enum Slot {
    Open {
        state: SessionState,
        last_seen: Instant,
    },
    /// The session ended. Never expires, so a closed id cannot be reused.
    Closed { cause: Option<EscalationCause> },
}

/// Process-local sessions keyed by id.
///
/// The escalation decision and the state update for a request happen under
/// one lock acquisition, so exactly one request can move a session into the
/// escalated state and claim the dispatch. The lock is never held across an
/// await point.
#[derive(Debug)]
pub struct SessionArena {
    slots: Mutex<HashMap<String, Slot>>,
    ttl: Duration,
}

impl Default for SessionArena {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_SESSION_TTL_SECS))
    }
}

impl SessionArena {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn with_slots<R>(&self, f: impl FnOnce(&mut HashMap<String, Slot>, Instant) -> R) -> R {
        let now = Instant::now();
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let ttl = self.ttl;
        slots.retain(|_, slot| match slot {
            Slot::Open { last_seen, .. } => now.saturating_duration_since(*last_seen) < ttl,
            Slot::Closed { .. } => true,
        });
        f(&mut slots, now)
    }

    /// Reject early if `session_id` is already closed.
    pub fn ensure_open(&self, session_id: &str) -> Result<(), SessionClosed> {
        self.with_slots(|slots, _| match slots.get(session_id) {
            Some(Slot::Closed { cause, .. }) => Err(SessionClosed {
                session_id: session_id.to_string(),
                cause: *cause,
            }),
            _ => Ok(()),
        })
    }

    /// Evaluate `policy` for this request and apply the outcome atomically.
    ///
    /// Creates the session on first use. On escalation the session state is
    /// dropped and replaced by a tombstone.
    pub fn advance(
        &self,
        session_id: &str,
        query: &str,
        resolved: &ResolvedIntent,
        policy: &EscalationPolicy,
    ) -> Result<Advance, SessionClosed> {
        self.with_slots(|slots, now| {
            let slot = slots
                .entry(session_id.to_string())
                .or_insert_with(|| Slot::Open {
                    state: SessionState::new(session_id),
                    last_seen: now,
                });

            let state = match &mut *slot {
                Slot::Open { state, last_seen } => {
                    *last_seen = now;
                    state
                }
                Slot::Closed { cause, .. } => {
                    return Err(SessionClosed {
                        session_id: session_id.to_string(),
                        cause: *cause,
                    });
                }
            };

            let decision = policy.evaluate(query, resolved, state);
            match decision {
                Decision::Continue => {
                    state.record(resolved.clone());
                    Ok(Advance {
                        decision,
                        fallback_count: state.fallback_count,
                        turn: state.turns(),
                    })
                }
                Decision::Escalate { cause, .. } => {
                    state.escalate(resolved.clone(), cause);
                    let advance = Advance {
                        decision,
                        fallback_count: state.fallback_count,
                        turn: state.turns(),
                    };
                    tracing::info!(
                        event = "session_escalated",
                        session_id,
                        cause = cause.as_str(),
                        turn = advance.turn,
                        "Session escalated and closed"
                    );
                    *slot = Slot::Closed { cause: Some(cause) };
                    Ok(advance)
                }
            }
        })
    }

    /// Close a session explicitly. Returns `false` if it was already closed.
    /// Unknown ids are tombstoned too.
    pub fn close(&self, session_id: &str) -> bool {
        self.with_slots(|slots, _| {
            let previous = slots.insert(session_id.to_string(), Slot::Closed { cause: None });
            match previous {
                Some(Slot::Closed { cause }) => {
                    // Keep the original tombstone.
                    slots.insert(session_id.to_string(), Slot::Closed { cause });
                    false
                }
                _ => true,
            }
        })
    }

    /// Copy of an open session's state.
    pub fn snapshot(&self, session_id: &str) -> Option<SessionState> {
        self.with_slots(|slots, _| match slots.get(session_id) {
            Some(Slot::Open { state, .. }) => Some(state.clone()),
            _ => None,
        })
    }

    pub fn is_closed(&self, session_id: &str) -> bool {
        self.ensure_open(session_id).is_err()
    }

    pub fn open_sessions(&self) -> usize {
        self.with_slots(|slots, _| {
            slots
                .values()
                .filter(|slot| matches!(slot, Slot::Open { .. }))
                .count()
        })
    }
}
