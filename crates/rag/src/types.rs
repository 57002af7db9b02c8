//! Domain types that flow through the query pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use wikivoice_core::{AppError, AppResult};

use crate::context::ContextBundle;
use crate::validation::validate_query_text;

/// Session titles are cut to this many characters.
pub const TITLE_MAX_LENGTH: usize = 50;

/// How the user produced the utterance. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    #[default]
    Text,
    Voice,
}

impl InputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputMode::Text => "text",
            InputMode::Voice => "voice",
        }
    }
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(InputMode::Text),
            "voice" => Ok(InputMode::Voice),
            other => Err(AppError::Validation(format!(
                "Unknown input mode '{}', expected 'text' or 'voice'",
                other
            ))),
        }
    }
}

/// A validated user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    text: String,
    mode: InputMode,
}

impl Utterance {
    /// Validate and normalise raw input.
    ///
    /// The text is trimmed, must be 1..=2000 characters, and must not look
    /// like an attempt to override the assistant's instructions.
    pub fn new(text: &str, mode: InputMode) -> AppResult<Self> {
        let text = validate_query_text(text)?;
        Ok(Self { text, mode })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }
}

/// A prior (utterance, answer) pair from the same conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub utterance: String,
    pub answer: String,
}

impl ConversationTurn {
    pub fn new(utterance: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            utterance: utterance.into(),
            answer: answer.into(),
        }
    }
}

/// The encyclopedia search query derived from an utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic(String);

impl Topic {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An encyclopedia article admitted as grounding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,

    /// Leading sentences of the article body
    pub extract: String,

    /// Word count of the full article body
    pub word_count: u64,
}

/// A cited source as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub url: String,
}

/// Result of one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    /// Conversational answer text
    pub response: String,

    /// Articles that grounded the answer, in relevance order, unique by url
    pub sources: Vec<SourceRef>,

    /// Internal: the topic that was searched
    #[serde(skip)]
    pub topic: String,

    /// Internal: topic extraction failed and the raw utterance was searched
    #[serde(skip)]
    pub topic_recovered: bool,
}

impl AnswerResult {
    /// Pair generated text with the sources of the bundle it was generated from.
    ///
    /// Sources come only from the bundle's articles, never from the text.
    pub fn from_bundle(response: impl Into<String>, bundle: &ContextBundle) -> Self {
        let mut seen = HashSet::new();
        let sources = bundle
            .articles
            .iter()
            .filter(|article| seen.insert(article.url.as_str()))
            .map(|article| SourceRef {
                title: article.title.clone(),
                url: article.url.clone(),
            })
            .collect();

        Self {
            response: response.into(),
            sources,
            topic: String::new(),
            topic_recovered: false,
        }
    }
}

/// Title for a new conversation, derived from its first utterance.
pub fn session_title(utterance: &str) -> String {
    let trimmed = utterance.trim();
    if trimmed.chars().count() > TITLE_MAX_LENGTH {
        let head: String = trimmed.chars().take(TITLE_MAX_LENGTH).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_mode_parsing() {
        assert_eq!("text".parse::<InputMode>().unwrap(), InputMode::Text);
        assert_eq!(" Voice ".parse::<InputMode>().unwrap(), InputMode::Voice);
        assert!("carrier-pigeon".parse::<InputMode>().is_err());
        assert_eq!(InputMode::default(), InputMode::Text);
    }

    #[test]
    fn test_utterance_is_trimmed() {
        let utterance = Utterance::new("  What is Rust?  ", InputMode::Voice).unwrap();
        assert_eq!(utterance.text(), "What is Rust?");
        assert_eq!(utterance.mode(), InputMode::Voice);
    }

    #[test]
    fn test_session_title_short() {
        assert_eq!(session_title("Tell me about Rolex"), "Tell me about Rolex");
    }

    #[test]
    fn test_session_title_truncates_on_char_boundary() {
        let long = "é".repeat(60);
        let title = session_title(&long);
        assert_eq!(title.chars().count(), TITLE_MAX_LENGTH + 3);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_answer_result_serialization_hides_internals() {
        let result = AnswerResult {
            response: "Hi".to_string(),
            sources: vec![SourceRef {
                title: "Rolex".to_string(),
                url: "https://en.wikipedia.org/wiki/Rolex".to_string(),
            }],
            topic: "Rolex".to_string(),
            topic_recovered: true,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["sources"][0]["title"], "Rolex");
        assert!(json.get("topic").is_none());
        assert!(json.get("topic_recovered").is_none());
    }
}
