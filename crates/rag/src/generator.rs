//! Answer generation.
//!
//! The only stage whose failure ends the request: there is no fallback
//! text generator, so every failure becomes
//! `AppError::GenerationUnavailable`.

use crate::context::ContextBundle;
use crate::types::AnswerResult;
use std::sync::Arc;
use std::time::Duration;
use wikivoice_core::{AppError, AppResult};
use wikivoice_llm::{LlmClient, LlmRequest};

/// Sampling settings for the answer call.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

pub struct AnswerGenerator {
    client: Arc<dyn LlmClient>,
    settings: GenerationSettings,
}

impl AnswerGenerator {
    pub fn new(client: Arc<dyn LlmClient>, settings: GenerationSettings) -> Self {
        Self { client, settings }
    }

    /// Generate the answer for an assembled bundle.
    ///
    /// Sources are taken from the bundle's articles, never from the text.
    pub async fn generate(&self, bundle: &ContextBundle) -> AppResult<AnswerResult> {
        let request = LlmRequest::new(&self.settings.model, bundle.to_messages())
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);

        tracing::debug!(
            provider = self.client.provider_name(),
            model = %self.settings.model,
            variant = %bundle.variant,
            messages = request.messages.len(),
            "Requesting answer"
        );

        let response = tokio::time::timeout(self.settings.timeout, self.client.complete(&request))
            .await
            .map_err(|_| {
                AppError::GenerationUnavailable(format!(
                    "answer generation timed out after {:?}",
                    self.settings.timeout
                ))
            })?
            .map_err(|e| AppError::GenerationUnavailable(e.to_string()))?;

        let text = response.content.trim();
        if text.is_empty() {
            return Err(AppError::GenerationUnavailable(
                "model returned an empty answer".to_string(),
            ));
        }

        tracing::debug!(
            completion_tokens = response.usage.completion_tokens,
            "Answer generated"
        );

        Ok(AnswerResult::from_bundle(text, bundle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextAssembler;
    use crate::tests::fakes::{FakeLlm, Reply};
    use crate::types::Article;
    use wikivoice_prompt::PromptLibrary;

    fn settings() -> GenerationSettings {
        GenerationSettings {
            model: "answer-model".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            timeout: Duration::from_millis(200),
        }
    }

    fn article(title: &str, url: &str) -> Article {
        Article {
            title: title.to_string(),
            url: url.to_string(),
            extract: format!("{} extract.", title),
            word_count: 800,
        }
    }

    fn bundle(articles: Vec<Article>) -> ContextBundle {
        ContextAssembler::new(Arc::new(PromptLibrary::builtin()), 5, 3).assemble(
            "question",
            articles,
            &[],
        )
    }

    #[tokio::test]
    async fn test_sources_come_from_bundle() {
        let llm = FakeLlm::new().on_model(
            "answer-model",
            Reply::Text("See https://evil.example/made-up for more. Rolex is Swiss.".into()),
        );
        let generator = AnswerGenerator::new(Arc::new(llm), settings());
        let bundle = bundle(vec![
            article("Rolex", "https://en.wikipedia.org/wiki/Rolex"),
            article("Rolex (brand)", "https://en.wikipedia.org/wiki/Rolex"),
        ]);

        let result = generator.generate(&bundle).await.unwrap();

        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].title, "Rolex");
        for source in &result.sources {
            assert!(bundle.articles.iter().any(|a| a.url == source.url));
        }
    }

    #[tokio::test]
    async fn test_failures_are_generation_unavailable() {
        for reply in [Reply::Fail, Reply::Hang, Reply::Text("   ".into())] {
            let llm = FakeLlm::new().on_model("answer-model", reply);
            let generator = AnswerGenerator::new(Arc::new(llm), settings());

            let err = generator.generate(&bundle(vec![])).await.unwrap_err();
            assert_eq!(err.code(), "generation_unavailable");
        }
    }

    #[tokio::test]
    async fn test_request_carries_sampling_settings() {
        let llm = FakeLlm::new().on_model("answer-model", Reply::Text("Answer.".into()));
        let generator = AnswerGenerator::new(Arc::new(llm.clone()), settings());

        generator.generate(&bundle(vec![])).await.unwrap();

        let request = llm.requests_for("answer-model").pop().unwrap();
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.max_tokens, Some(500));
    }
}
