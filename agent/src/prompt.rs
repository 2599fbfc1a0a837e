use helpdesk_core::config::Persona;
use helpdesk_core::knowledge::KnowledgeEntry;

/// Generation input, kept as separate parts so the generator can send them
/// as separate content blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub context: String,
    pub query: String,
}

impl Prompt {
    pub fn parts(&self) -> [&str; 3] {
        [self.system.as_str(), self.context.as_str(), self.query.as_str()]
    }
}

pub fn system_instruction(persona: &Persona) -> String {
    format!(
        "You are a {} support assistant. Respond in a {} and {} manner. \
         Provide direct, actionable guidance. \
         Do not mention internal systems, confidence levels, or escalation logic.",
        persona.tone, persona.verbosity, persona.style
    )
}

fn render_context(entries: &[&KnowledgeEntry]) -> String {
    if entries.is_empty() {
        return "Context:\nNo knowledge base entry covers this question.".to_string();
    }
    let mut context = String::from("Context:");
    for entry in entries {
        context.push('\n');
        if entry.title.is_empty() {
            context.push_str(&format!("- {}", entry.content));
        } else {
            context.push_str(&format!("- {}: {}", entry.title, entry.content));
        }
    }
    context
}

pub fn build_prompt(persona: &Persona, context: &[&KnowledgeEntry], query: &str) -> Prompt {
    Prompt {
        system: system_instruction(persona),
        context: render_context(context),
        query: query.to_string(),
    }
}
