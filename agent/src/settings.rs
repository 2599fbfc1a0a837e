use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use helpdesk_core::config::ConfigStore;

use crate::arena::{DEFAULT_SESSION_TTL_SECS, SessionArena};
use crate::dispatch::ActionDispatcher;
use crate::generator::{DEFAULT_GEMINI_MODEL, GeminiGenerator};
use crate::pipeline::{DEFAULT_GENERATION_TIMEOUT_MS, Pipeline};
use crate::sink::{JsonlTraceSink, TracingTraceSink};

/// Runtime knobs shared by every binary that runs the pipeline.
#[derive(Args, Clone, Debug)]
pub struct AgentSettings {
    /// Gemini API key; without it every reply is the persona fallback text
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model name
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_GEMINI_MODEL)]
    pub gemini_model: String,

    /// Upper bound for one generation call, in milliseconds
    #[arg(long, env = "HELPDESK_GENERATION_TIMEOUT_MS", default_value_t = DEFAULT_GENERATION_TIMEOUT_MS)]
    pub generation_timeout_ms: u64,

    /// Append one JSON line per request trace to this file
    #[arg(long, env = "HELPDESK_TRACE_LOG")]
    pub trace_log: Option<PathBuf>,

    /// Idle open sessions are forgotten after this many seconds
    #[arg(long, env = "HELPDESK_SESSION_TTL_SECS", default_value_t = DEFAULT_SESSION_TTL_SECS)]
    pub session_ttl_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            generation_timeout_ms: DEFAULT_GENERATION_TIMEOUT_MS,
            trace_log: None,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

impl AgentSettings {
    /// Assemble a pipeline with the Gemini generator, a tracing sink and,
    /// when configured, a JSONL sink.
    pub fn build_pipeline(
        &self,
        store: Arc<ConfigStore>,
        dispatcher: Arc<dyn ActionDispatcher>,
    ) -> Pipeline {
        let generator = GeminiGenerator::new(self.gemini_api_key.clone(), self.gemini_model.clone());
        tracing::info!(
            event = "pipeline_configured",
            model = generator.model(),
            generation_timeout_ms = self.generation_timeout_ms,
            session_ttl_secs = self.session_ttl_secs,
            trace_log = self.trace_log.is_some(),
            "Pipeline configured"
        );
        let mut pipeline = Pipeline::new(store, Arc::new(generator), dispatcher)
            .with_arena(Arc::new(SessionArena::new(Duration::from_secs(
                self.session_ttl_secs,
            ))))
            .with_generation_timeout(Duration::from_millis(self.generation_timeout_ms))
            .with_sink(Arc::new(TracingTraceSink));
        if let Some(path) = &self.trace_log {
            pipeline = pipeline.with_sink(Arc::new(JsonlTraceSink::new(path.clone())));
        }
        pipeline
    }
}
