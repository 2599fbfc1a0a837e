use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::escalation::{ActionsConfig, EscalationPolicy};
use crate::intent::{IntentResolver, IntentsConfig};
use crate::knowledge::{KnowledgeBase, KnowledgeEntry, SearchConfig};

pub const PERSONA_FILE: &str = "persona.yaml";
pub const INTENTS_FILE: &str = "intents.yaml";
pub const ACTIONS_FILE: &str = "actions.yaml";
pub const KNOWLEDGE_FILE: &str = "knowledge.json";

pub const DEFAULT_FALLBACK_RESPONSE: &str = "I'm sorry, I can't answer that right now. \
     Please try again in a moment or ask to speak with a support agent.";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing config file: {}", path.display())]
    Missing { path: PathBuf },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {document}: {message}")]
    Parse { document: String, message: String },
    #[error("invalid {document}: {message}")]
    Invalid {
        document: &'static str,
        message: String,
    },
}

/// Tone and style constraints for generated text (`persona.yaml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default = "default_verbosity")]
    pub verbosity: String,
    #[serde(default = "default_style")]
    pub style: String,
    /// Reply used whenever text generation fails.
    #[serde(default = "default_fallback_response")]
    pub fallback_response: String,
    #[serde(default)]
    pub search: SearchConfig,
}

fn default_tone() -> String {
    "professional".to_string()
}

fn default_verbosity() -> String {
    "concise".to_string()
}

fn default_style() -> String {
    "helpful".to_string()
}

fn default_fallback_response() -> String {
    DEFAULT_FALLBACK_RESPONSE.to_string()
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            industry: None,
            tone: default_tone(),
            verbosity: default_verbosity(),
            style: default_style(),
            fallback_response: default_fallback_response(),
            search: SearchConfig::default(),
        }
    }
}

/// The three documents exactly as authored, served back as resources.
#[derive(Debug, Clone)]
pub struct RawDocuments {
    pub persona: Value,
    pub intents: Value,
    pub actions: Value,
}

/// Loaded, validated configuration. Built once at startup and shared
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    pub persona: Persona,
    pub intents: IntentsConfig,
    pub actions: ActionsConfig,
    pub knowledge: KnowledgeBase,
    pub resolver: IntentResolver,
    pub policy: EscalationPolicy,
    pub raw: RawDocuments,
}

impl ConfigStore {
    /// Load `persona.yaml`, `intents.yaml`, `actions.yaml` from `config_dir`
    /// and `knowledge.json` from `data_dir`. Any missing or invalid document
    /// is an error; there is no partial configuration.
    pub fn load(config_dir: &Path, data_dir: &Path) -> Result<Self, ConfigError> {
        let persona = read_yaml(&config_dir.join(PERSONA_FILE))?;
        let intents = read_yaml(&config_dir.join(INTENTS_FILE))?;
        let actions = read_yaml(&config_dir.join(ACTIONS_FILE))?;
        let knowledge = read_json(&data_dir.join(KNOWLEDGE_FILE))?;
        Self::from_documents(persona, intents, actions, knowledge)
    }

    /// Build from already-parsed documents, e.g. resources read over MCP.
    pub fn from_documents(
        persona: Value,
        intents: Value,
        actions: Value,
        knowledge: Value,
    ) -> Result<Self, ConfigError> {
        let persona_cfg: Persona = typed(PERSONA_FILE, &persona)?;
        let intents_cfg: IntentsConfig = typed(INTENTS_FILE, &intents)?;
        let actions_cfg: ActionsConfig = typed(ACTIONS_FILE, &actions)?;
        let entries: Vec<KnowledgeEntry> = typed(KNOWLEDGE_FILE, &knowledge)?;

        validate_intents(&intents_cfg)?;
        validate_actions(&actions_cfg)?;
        validate_knowledge(&entries)?;

        let knowledge = KnowledgeBase::new(entries, &persona_cfg.search);
        let resolver = IntentResolver::new(&intents_cfg);
        let policy = EscalationPolicy::new(&actions_cfg);

        Ok(Self {
            persona: persona_cfg,
            intents: intents_cfg,
            actions: actions_cfg,
            knowledge,
            resolver,
            policy,
            raw: RawDocuments {
                persona,
                intents,
                actions,
            },
        })
    }
}

fn read_text(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Missing {
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_yaml(path: &Path) -> Result<Value, ConfigError> {
    let text = read_text(path)?;
    serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
        document: path.display().to_string(),
        message: e.to_string(),
    })
}

fn read_json(path: &Path) -> Result<Value, ConfigError> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
        document: path.display().to_string(),
        message: e.to_string(),
    })
}

fn typed<T: DeserializeOwned>(document: &str, value: &Value) -> Result<T, ConfigError> {
    serde_json::from_value(value.clone()).map_err(|e| ConfigError::Parse {
        document: document.to_string(),
        message: e.to_string(),
    })
}

fn validate_intents(config: &IntentsConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for intent in &config.intents {
        if intent.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                document: INTENTS_FILE,
                message: "intent name must not be empty".to_string(),
            });
        }
        if !seen.insert(intent.name.as_str()) {
            return Err(ConfigError::Invalid {
                document: INTENTS_FILE,
                message: format!("duplicate intent '{}'", intent.name),
            });
        }
        let has_trigger = intent
            .primary_triggers
            .iter()
            .chain(&intent.secondary_triggers)
            .any(|t| !t.trim().is_empty());
        if !has_trigger {
            return Err(ConfigError::Invalid {
                document: INTENTS_FILE,
                message: format!("intent '{}' has no triggers", intent.name),
            });
        }
    }
    if config.intent_resolution.fallback_intent.trim().is_empty() {
        return Err(ConfigError::Invalid {
            document: INTENTS_FILE,
            message: "intent_resolution.fallback_intent must not be empty".to_string(),
        });
    }
    Ok(())
}

fn validate_actions(config: &ActionsConfig) -> Result<(), ConfigError> {
    for rule in &config.rules {
        if rule.threshold() == Some(0) {
            return Err(ConfigError::Invalid {
                document: ACTIONS_FILE,
                message: format!("rule '{}' needs a threshold of at least 1", rule.cause().as_str()),
            });
        }
    }
    Ok(())
}

fn validate_knowledge(entries: &[KnowledgeEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for entry in entries {
        if !seen.insert(entry.id.as_str()) {
            return Err(ConfigError::Invalid {
                document: KNOWLEDGE_FILE,
                message: format!("duplicate knowledge id '{}'", entry.id),
            });
        }
    }
    Ok(())
}
