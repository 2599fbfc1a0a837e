use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use helpdesk_core::config::ConfigStore;
use helpdesk_core::intent::{ConfidenceTier, Severity};
use helpdesk_core::trace::{ActionOutcome, GenerationOutcome, RejectedTrace, StageLatencies, Trace};

use crate::dispatch::{ActionDispatcher, DispatchError, DispatchReceipt, DispatchRequest};
use crate::generator::{GenerationError, TextGenerator};
use crate::prompt::Prompt;
use crate::sink::TraceSink;

pub fn store(actions: serde_json::Value) -> ConfigStore {
    ConfigStore::from_documents(
        json!({
            "tone": "friendly",
            "verbosity": "brief",
            "style": "plain",
            "fallback_response": "Sorry, please try again later.",
            "search": { "mode": "keyword", "text_processing": { "stopwords": ["the", "my", "i", "a"] } }
        }),
        json!({
            "intents": [
                { "name": "billing", "primary_triggers": ["billing", "refund", "invoice"], "severity": "high" },
                { "name": "shipping", "primary_triggers": ["track", "delivery"], "severity": "low" },
                { "name": "account", "primary_triggers": ["password", "login"], "severity": "medium" }
            ],
            "intent_resolution": { "fallback_intent": "general" }
        }),
        actions,
        json!([
            { "id": "kb-refund", "title": "Refund policy", "content": "Refunds are issued within 5 business days.", "category": "billing" },
            { "id": "kb-track", "title": "Tracking orders", "content": "Track any delivery with the tracking link in your confirmation email.", "category": "shipping" },
            { "id": "kb-general", "title": "Support hours", "content": "Support is available around the clock.", "category": "general" }
        ]),
    )
    .unwrap()
}

pub fn sample_trace(session_id: &str) -> Trace {
    Trace {
        request_id: uuid::Uuid::now_v7(),
        session_id: session_id.to_string(),
        recorded_at: chrono::Utc::now(),
        intent: "general".to_string(),
        confidence: ConfidenceTier::Fallback,
        severity: Severity::Low,
        knowledge_matches: 0,
        knowledge_entry_id: None,
        fallback_used: true,
        escalation: None,
        action_taken: false,
        action: ActionOutcome::NotTriggered,
        generation: GenerationOutcome::Generated,
        latency_ms: StageLatencies::default(),
    }
}

pub enum Script {
    Reply(&'static str),
    Fail(GenerationError),
    Hang,
}

pub struct FakeGenerator {
    script: Script,
    pub prompts: Mutex<Vec<Prompt>>,
}

impl FakeGenerator {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        match &self.script {
            Script::Reply(text) => Ok(text.to_string()),
            Script::Fail(err) => Err(err.clone()),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok("too late".to_string())
            }
        }
    }
}

#[derive(Default)]
pub struct RecordingDispatcher {
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<DispatchRequest>>,
    pub fail_with: Option<DispatchError>,
}

impl RecordingDispatcher {
    pub fn failing(err: DispatchError) -> Self {
        Self {
            fail_with: Some(err),
            ..Default::default()
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionDispatcher for RecordingDispatcher {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchReceipt, DispatchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        Ok(DispatchReceipt {
            ticket_id: format!("TCK-{n}"),
            duplicate: false,
        })
    }
}

#[derive(Default)]
pub struct MemorySink {
    pub traces: Mutex<Vec<Trace>>,
    pub rejections: Mutex<Vec<RejectedTrace>>,
}

#[async_trait]
impl TraceSink for MemorySink {
    async fn emit(&self, trace: &Trace) {
        self.traces.lock().unwrap().push(trace.clone());
    }

    async fn emit_rejected(&self, rejected: &RejectedTrace) {
        self.rejections.lock().unwrap().push(rejected.clone());
    }
}
