//! Topic extraction.
//!
//! Turns a conversational utterance into a short encyclopedia search query
//! using a cheap model call. Any failure is reported as
//! `AppError::Extraction`; callers are expected to fall back to the raw
//! utterance.

use crate::types::{ConversationTurn, Topic, Utterance};
use std::sync::Arc;
use std::time::Duration;
use wikivoice_core::{AppError, AppResult};
use wikivoice_llm::{ChatMessage, LlmClient, LlmRequest};
use wikivoice_prompt::{render_prompt, PromptLibrary, TOPIC_EXTRACT};

/// Sampling settings for the extraction call.
#[derive(Debug, Clone)]
pub struct TopicSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_chars: usize,
    pub timeout: Duration,
}

pub struct TopicExtractor {
    client: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    settings: TopicSettings,
}

impl TopicExtractor {
    pub fn new(
        client: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
        settings: TopicSettings,
    ) -> Self {
        Self {
            client,
            prompts,
            settings,
        }
    }

    /// Extract the searchable subject of `utterance`.
    ///
    /// `recent_history` is only used to resolve follow-ups such as
    /// "what about its history?".
    pub async fn extract(
        &self,
        utterance: &Utterance,
        recent_history: &[ConversationTurn],
    ) -> AppResult<Topic> {
        let instruction = self
            .prompts
            .get(TOPIC_EXTRACT)
            .and_then(|definition| render_prompt(definition, &serde_json::json!({})))
            .map_err(|e| AppError::Extraction(e.to_string()))?;

        let mut messages = Vec::with_capacity(2 + recent_history.len() * 2);
        messages.push(ChatMessage::system(instruction));
        for turn in recent_history {
            messages.push(ChatMessage::user(&turn.utterance));
            messages.push(ChatMessage::assistant(&turn.answer));
        }
        messages.push(ChatMessage::user(utterance.text()));

        let request = LlmRequest::new(&self.settings.model, messages)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);

        let response = tokio::time::timeout(self.settings.timeout, self.client.complete(&request))
            .await
            .map_err(|_| {
                AppError::Extraction(format!("timed out after {:?}", self.settings.timeout))
            })?
            .map_err(|e| AppError::Extraction(e.to_string()))?;

        let topic = clean_topic(&response.content, self.settings.max_chars)
            .ok_or_else(|| AppError::Extraction("model returned an empty topic".to_string()))?;

        tracing::info!(topic = %topic, "Extracted search topic");
        Ok(Topic::new(topic))
    }
}

/// Normalise raw model output into a single-line topic.
///
/// Keeps the first non-empty line, strips wrapping quotes and trailing
/// punctuation, and truncates to `max_chars` characters.
pub fn clean_topic(raw: &str, max_chars: usize) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|line| !line.is_empty())?;

    let line = line
        .trim_start_matches(|c: char| is_wrapper(c) || c.is_whitespace())
        .trim_end_matches(|c: char| {
            is_wrapper(c) || matches!(c, '.' | '!' | '?') || c.is_whitespace()
        });

    let truncated: String = line.chars().take(max_chars).collect();
    let truncated = truncated.trim();

    (!truncated.is_empty()).then(|| truncated.to_string())
}

fn is_wrapper(c: char) -> bool {
    matches!(c, '"' | '\'' | '`' | '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fakes::{FakeLlm, Reply};
    use crate::types::InputMode;

    fn settings() -> TopicSettings {
        TopicSettings {
            model: "topic-model".to_string(),
            temperature: 0.0,
            max_tokens: 50,
            max_chars: 100,
            timeout: Duration::from_millis(200),
        }
    }

    fn extractor(llm: &FakeLlm) -> TopicExtractor {
        TopicExtractor::new(
            Arc::new(llm.clone()),
            Arc::new(PromptLibrary::builtin()),
            settings(),
        )
    }

    #[test]
    fn test_clean_topic() {
        assert_eq!(clean_topic("  Rolex \n", 100).as_deref(), Some("Rolex"));
        assert_eq!(clean_topic("\"Eiffel Tower\".", 100).as_deref(), Some("Eiffel Tower"));
        assert_eq!(
            clean_topic("\n\nquantum computing\nextra", 100).as_deref(),
            Some("quantum computing")
        );
        assert_eq!(clean_topic("   \n  ", 100), None);
        assert_eq!(clean_topic("\"\"", 100), None);
    }

    #[test]
    fn test_clean_topic_strips_quotes_behind_punctuation() {
        for raw in ["\"Eiffel Tower\".", "'Eiffel Tower'!", "*Eiffel Tower*.", "`Eiffel Tower` ?"] {
            assert_eq!(
                clean_topic(raw, 100).as_deref(),
                Some("Eiffel Tower"),
                "cleaning {:?}",
                raw
            );
        }
        assert_eq!(clean_topic("\"Rolex.\"", 100).as_deref(), Some("Rolex"));
    }

    #[test]
    fn test_clean_topic_truncates_long_output() {
        let long = "word ".repeat(100);
        let topic = clean_topic(&long, 20).unwrap();
        assert!(topic.chars().count() <= 20);
        assert!(!topic.ends_with(' '));
    }

    #[tokio::test]
    async fn test_extract_sends_history_for_follow_ups() {
        let llm = FakeLlm::new().on_model("topic-model", Reply::Text("Eiffel Tower".into()));
        let history = vec![ConversationTurn::new(
            "Tell me about the Eiffel Tower",
            "The Eiffel Tower is in Paris.",
        )];
        let utterance = Utterance::new("What about its history?", InputMode::Text).unwrap();

        let topic = extractor(&llm).extract(&utterance, &history).await.unwrap();

        assert_eq!(topic.as_str(), "Eiffel Tower");
        let request = llm.requests_for("topic-model").pop().unwrap();
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.max_tokens, Some(50));
        assert_eq!(request.messages[3].content, "What about its history?");
    }

    #[tokio::test]
    async fn test_remote_error_is_extraction_error() {
        let llm = FakeLlm::new().on_model("topic-model", Reply::Fail);
        let utterance = Utterance::new("Rolex", InputMode::Text).unwrap();

        let err = extractor(&llm).extract(&utterance, &[]).await.unwrap_err();
        assert_eq!(err.code(), "extraction_failed_recovered");
    }

    #[tokio::test]
    async fn test_timeout_is_extraction_error() {
        let llm = FakeLlm::new().on_model("topic-model", Reply::Hang);
        let utterance = Utterance::new("Rolex", InputMode::Text).unwrap();

        let err = extractor(&llm).extract(&utterance, &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Extraction(ref m) if m.contains("timed out")));
    }

    #[tokio::test]
    async fn test_blank_output_is_extraction_error() {
        let llm = FakeLlm::new().on_model("topic-model", Reply::Text("  \n ".into()));
        let utterance = Utterance::new("Rolex", InputMode::Text).unwrap();

        let err = extractor(&llm).extract(&utterance, &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
    }
}
