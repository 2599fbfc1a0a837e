use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use helpdesk_core::config::ConfigStore;
use helpdesk_core::error::codes;
use helpdesk_core::escalation::{Decision, EscalationCause};
use helpdesk_core::intent::ResolvedIntent;
use helpdesk_core::knowledge::KnowledgeEntry;
use helpdesk_core::trace::{
    ActionOutcome, GenerationOutcome, RejectedTrace, StageLatencies, Trace, millis,
};

use crate::arena::{SessionArena, SessionClosed};
use crate::dispatch::{ActionDispatcher, DispatchRequest};
use crate::generator::{GenerationError, TextGenerator};
use crate::prompt::build_prompt;
use crate::sink::TraceSink;

pub const DEFAULT_GENERATION_TIMEOUT_MS: u64 = 10_000;

/// Knowledge entries handed to the generator for one request.
pub const MAX_CONTEXT_ENTRIES: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("query must not be empty")]
    EmptyQuery,
    #[error(transparent)]
    SessionClosed(#[from] SessionClosed),
}

impl PipelineError {
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::EmptyQuery => codes::VALIDATION_FAILED,
            PipelineError::SessionClosed(_) => codes::SESSION_CLOSED,
        }
    }
}

/// Result of one handled request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatReply {
    pub session_id: String,
    pub reply: String,
    pub intent: ResolvedIntent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationCause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    /// No further requests are accepted for this session.
    pub session_closed: bool,
    pub trace: Trace,
}

/// One request, end to end.
///
/// Stage order: knowledge lookup, intent resolution, escalation decision
/// (applied to the session atomically), generation, dispatch when the
/// decision escalated, trace emission. Generation runs whatever the decision
/// and cannot influence it.
pub struct Pipeline {
    store: Arc<ConfigStore>,
    arena: Arc<SessionArena>,
    generator: Arc<dyn TextGenerator>,
    dispatcher: Arc<dyn ActionDispatcher>,
    sinks: Vec<Arc<dyn TraceSink>>,
    generation_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        store: Arc<ConfigStore>,
        generator: Arc<dyn TextGenerator>,
        dispatcher: Arc<dyn ActionDispatcher>,
    ) -> Self {
        Self {
            store,
            arena: Arc::new(SessionArena::default()),
            generator,
            dispatcher,
            sinks: Vec::new(),
            generation_timeout: Duration::from_millis(DEFAULT_GENERATION_TIMEOUT_MS),
        }
    }

    pub fn with_arena(mut self, arena: Arc<SessionArena>) -> Self {
        self.arena = arena;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn arena(&self) -> &SessionArena {
        &self.arena
    }

    /// Close a session explicitly. Returns `false` if it was already closed.
    pub fn close_session(&self, session_id: &str) -> bool {
        let closed = self.arena.close(session_id);
        if closed {
            tracing::info!(event = "session_closed", session_id, "Session closed on request");
        }
        closed
    }

    /// Handle one request. Every call is traced: accepted requests emit a
    /// [`Trace`], rejected ones a [`RejectedTrace`].
    pub async fn handle(
        &self,
        session_id: Option<&str>,
        query: &str,
    ) -> Result<ChatReply, PipelineError> {
        let started = Instant::now();
        let result = self.run(session_id, query, started).await;
        if let Err(err) = &result {
            let rejected = RejectedTrace {
                request_id: Uuid::now_v7(),
                session_id: match err {
                    PipelineError::SessionClosed(closed) => Some(closed.session_id.clone()),
                    PipelineError::EmptyQuery => session_id.map(str::to_string),
                },
                recorded_at: chrono::Utc::now(),
                rejection: err.code().to_string(),
                escalation: match err {
                    PipelineError::SessionClosed(closed) => closed.cause,
                    PipelineError::EmptyQuery => None,
                },
                total_ms: millis(started.elapsed()),
            };
            for sink in &self.sinks {
                sink.emit_rejected(&rejected).await;
            }
        }
        result
    }

    async fn run(
        &self,
        session_id: Option<&str>,
        query: &str,
        started: Instant,
    ) -> Result<ChatReply, PipelineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PipelineError::EmptyQuery);
        }
        let session_id = session_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        self.arena.ensure_open(&session_id)?;

        let knowledge = &self.store.knowledge;
        let stage = Instant::now();
        let hits = knowledge.search(query);
        let best = knowledge.best_match(query).map(|m| m.entry);
        let knowledge_ms = millis(stage.elapsed());
        let knowledge_matches = hits.len();

        let stage = Instant::now();
        let resolved = self.store.resolver.resolve(query);
        let intent_ms = millis(stage.elapsed());

        // Best match first, then the remaining search hits in search order.
        let mut context: Vec<&KnowledgeEntry> = best.into_iter().collect();
        for entry in hits {
            if context.len() >= MAX_CONTEXT_ENTRIES {
                break;
            }
            if !context.iter().any(|c| c.id == entry.id) {
                context.push(entry);
            }
        }
        let fallback_used = context.is_empty();
        if fallback_used {
            context.extend(knowledge.fallback_for_intent(&resolved.intent));
        }

        let advance = self
            .arena
            .advance(&session_id, query, &resolved, &self.store.policy)?;

        let stage = Instant::now();
        let prompt = build_prompt(&self.store.persona, &context, query);
        let generated =
            match tokio::time::timeout(self.generation_timeout, self.generator.generate(&prompt))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(GenerationError::Timeout(self.generation_timeout)),
            };
        let generation_ms = millis(stage.elapsed());
        let (reply, generation) = match generated {
            Ok(text) => (text, GenerationOutcome::Generated),
            Err(err) => {
                tracing::warn!(
                    event = "generation_failed",
                    session_id = %session_id,
                    kind = err.kind(),
                    error = %err,
                    "Generation failed; using fallback response"
                );
                (
                    self.store.persona.fallback_response.clone(),
                    GenerationOutcome::Fallback {
                        error: err.to_string(),
                    },
                )
            }
        };

        let mut action_ms = None;
        let action = match advance.decision {
            Decision::Continue => ActionOutcome::NotTriggered,
            Decision::Escalate { cause, action } => {
                let stage = Instant::now();
                let request = DispatchRequest {
                    action,
                    session_id: session_id.clone(),
                    intent: resolved.intent.clone(),
                    issue: query.to_string(),
                };
                let outcome = match self.dispatcher.dispatch(&request).await {
                    Ok(receipt) => {
                        tracing::info!(
                            event = "action_dispatched",
                            session_id = %session_id,
                            cause = cause.as_str(),
                            action = action.as_str(),
                            ticket_id = %receipt.ticket_id,
                            duplicate = receipt.duplicate,
                            "Escalation action dispatched"
                        );
                        ActionOutcome::Created {
                            action,
                            ticket_id: receipt.ticket_id,
                        }
                    }
                    Err(err) => {
                        tracing::warn!(
                            event = "action_dispatch_failed",
                            session_id = %session_id,
                            cause = cause.as_str(),
                            action = action.as_str(),
                            error = %err,
                            "Escalation action failed; session stays closed"
                        );
                        ActionOutcome::Failed {
                            action,
                            error: err.to_string(),
                        }
                    }
                };
                action_ms = Some(millis(stage.elapsed()));
                outcome
            }
        };

        let escalation = advance.decision.cause();
        let ticket_id = match &action {
            ActionOutcome::Created { ticket_id, .. } => Some(ticket_id.clone()),
            _ => None,
        };

        let trace = Trace {
            request_id: Uuid::now_v7(),
            session_id: session_id.clone(),
            recorded_at: chrono::Utc::now(),
            intent: resolved.intent.clone(),
            confidence: resolved.confidence,
            severity: resolved.severity,
            knowledge_matches,
            knowledge_entry_id: context.first().map(|e| e.id.clone()),
            fallback_used,
            escalation,
            action_taken: action.was_attempted(),
            action,
            generation,
            latency_ms: StageLatencies {
                knowledge_search: knowledge_ms,
                intent_resolution: intent_ms,
                generation: generation_ms,
                action: action_ms,
                total: millis(started.elapsed()),
            },
        };
        for sink in &self.sinks {
            sink.emit(&trace).await;
        }

        Ok(ChatReply {
            session_id,
            reply,
            intent: resolved,
            escalation,
            ticket_id,
            session_closed: escalation.is_some(),
            trace,
        })
    }
}
