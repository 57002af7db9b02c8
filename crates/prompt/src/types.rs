//! Prompt types for WikiVoice.

use serde::{Deserialize, Serialize};

/// A prompt definition, either built in or loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// What the prompt is for
    #[serde(default)]
    pub description: String,

    /// Template string with Handlebars syntax
    pub template: String,
}

impl PromptDefinition {
    pub fn new(id: &str, title: &str, template: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            api_version: "1.0".to_string(),
            description: String::new(),
            template: template.to_string(),
        }
    }
}
