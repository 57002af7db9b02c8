//! Prompt system for WikiVoice.
//!
//! This crate provides structured prompt management with:
//! - Built-in prompts for topic extraction and answering
//! - YAML overrides loaded from a prompts directory
//! - Handlebars template rendering

pub mod builder;
pub mod library;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::render_prompt;
pub use library::{PromptLibrary, ANSWER_EMPTY, ANSWER_GROUNDED, DECLINE_DIRECTIVE, TOPIC_EXTRACT};
pub use loader::{list_prompts, load_prompt};
pub use types::PromptDefinition;
