//! Built-in prompts and per-deployment overrides.
//!
//! Every prompt the pipeline renders has a built-in definition here. A
//! prompts directory may replace any of them by id; the empty-context
//! answer prompt must keep its decline directive.

use crate::loader::load_prompt;
use crate::types::PromptDefinition;
use std::collections::HashMap;
use std::path::Path;
use wikivoice_core::{AppError, AppResult};

/// Reduces an utterance to a searchable topic.
pub const TOPIC_EXTRACT: &str = "topic.extract";

/// System instruction used when at least one article grounds the answer.
pub const ANSWER_GROUNDED: &str = "answer.grounded";

/// System instruction used when retrieval found nothing.
pub const ANSWER_EMPTY: &str = "answer.empty";

/// Sentence the model must reply with when it has no grounding.
pub const DECLINE_DIRECTIVE: &str = "I couldn't find relevant Wikipedia articles for your question. \
Please try rephrasing or ask about a different topic.";

const TOPIC_EXTRACT_TEMPLATE: &str = r#"Extract the key topic or entity that the user wants to learn about from their latest message.

Rules:
1. Return ONLY the main topic/entity name, nothing else
2. Remove conversational words like "do you know", "tell me about", "what is", etc.
3. Keep proper nouns and brand names exactly as written
4. If the message is already just a topic name, return it as-is
5. For follow-up questions ("what about its history?"), use the earlier messages to identify the subject being discussed

Examples:
- "do you know anything about Rolex" -> "Rolex"
- "can you tell me about the Eiffel Tower?" -> "Eiffel Tower"
- "what is quantum computing" -> "quantum computing"
- "I'm curious about Albert Einstein's life" -> "Albert Einstein"
- "Rolex" -> "Rolex"
- "how does photosynthesis work" -> "photosynthesis""#;

const ANSWER_GROUNDED_TEMPLATE: &str = r#"You are {{assistant}}, a helpful assistant that answers questions using ONLY the Wikipedia excerpts below as your knowledge source.

RULES:
1. Use ONLY information from the WIKIPEDIA CONTEXT section
2. NEVER use outside or internal knowledge; if the excerpts do not cover the question, say so
3. Cite the article each fact comes from by its title
4. Keep responses concise but informative, two or three short paragraphs at most
5. Be conversational and friendly; the user may be listening to your answer

WIKIPEDIA CONTEXT:
{{#each articles}}
## {{this.title}}
{{this.extract}}

{{/each}}"#;

const ANSWER_EMPTY_TEMPLATE: &str = r#"You are {{assistant}}, a helpful assistant that answers questions using ONLY Wikipedia as its knowledge source.

WIKIPEDIA CONTEXT:
(EMPTY - No Wikipedia articles were found for this question.)

You MUST NOT answer from your own knowledge. Decline politely and reply with:
"{{decline}}""#;

/// The set of prompts a pipeline renders.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    prompts: HashMap<String, PromptDefinition>,
}

impl PromptLibrary {
    /// Library containing only the built-in prompts.
    pub fn builtin() -> Self {
        let mut topic =
            PromptDefinition::new(TOPIC_EXTRACT, "Topic extraction", TOPIC_EXTRACT_TEMPLATE);
        topic.description =
            "Reduce a conversational message to an encyclopedia search topic".to_string();

        let mut grounded =
            PromptDefinition::new(ANSWER_GROUNDED, "Grounded answer", ANSWER_GROUNDED_TEMPLATE);
        grounded.description = "Answer strictly from the supplied article extracts".to_string();

        let mut empty =
            PromptDefinition::new(ANSWER_EMPTY, "Empty-context answer", ANSWER_EMPTY_TEMPLATE);
        empty.description = "Decline when no article was found".to_string();

        let prompts = [topic, grounded, empty]
            .into_iter()
            .map(|def| (def.id.clone(), def))
            .collect();

        Self { prompts }
    }

    /// Built-in prompts, with any `<id>.yml` found in `prompts_dir` taking precedence.
    pub fn load(prompts_dir: Option<&Path>) -> AppResult<Self> {
        let mut library = Self::builtin();

        let Some(dir) = prompts_dir else {
            return Ok(library);
        };

        for id in [TOPIC_EXTRACT, ANSWER_GROUNDED, ANSWER_EMPTY] {
            if dir.join(format!("{}.yml", id)).exists() {
                let definition = load_prompt(dir, id)?;
                library.insert(definition)?;
            }
        }

        Ok(library)
    }

    /// Replace a prompt definition.
    pub fn insert(&mut self, definition: PromptDefinition) -> AppResult<()> {
        let keeps_directive = definition.template.contains(DECLINE_DIRECTIVE)
            || definition.template.contains("{{decline}}");
        if definition.id == ANSWER_EMPTY && !keeps_directive {
            return Err(AppError::Prompt(format!(
                "Prompt '{}' must keep the decline directive",
                ANSWER_EMPTY
            )));
        }

        tracing::debug!("Registered prompt override: {}", definition.id);
        self.prompts.insert(definition.id.clone(), definition);
        Ok(())
    }

    /// Look up a prompt by id.
    pub fn get(&self, id: &str) -> AppResult<&PromptDefinition> {
        self.prompts
            .get(id)
            .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", id)))
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}
