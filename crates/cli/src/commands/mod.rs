//! Command handlers for the WikiVoice CLI.
//!
//! Each command lives in its own submodule; the wiring shared between them
//! (building the pipeline and its remote clients from configuration) lives
//! here.

pub mod ask;
pub mod chat;
pub mod search;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use search::SearchCommand;

use std::sync::Arc;
use wikivoice_core::{config::AppConfig, AppResult};
use wikivoice_llm::create_client;
use wikivoice_prompt::PromptLibrary;
use wikivoice_rag::{AnswerResult, RagPipeline, WikipediaApi};

/// Build the full query pipeline from configuration.
pub(crate) fn build_pipeline(config: &AppConfig) -> AppResult<RagPipeline> {
    config.validate()?;

    let api_key = config.resolve_api_key();
    let llm = create_client(
        &config.provider,
        config.provider_endpoint(),
        api_key.as_deref(),
        config.provider_timeout(),
    )?;

    let encyclopedia = Arc::new(WikipediaApi::new(&config.wikipedia)?);
    let prompts = Arc::new(PromptLibrary::load(config.prompts_dir.as_deref())?);

    tracing::debug!(
        provider = llm.provider_name(),
        topic_model = %config.topic_model(),
        "Pipeline ready"
    );

    Ok(RagPipeline::from_config(config, llm, encyclopedia, prompts))
}

/// Plain-text rendering of an answer and its sources.
pub(crate) fn render_answer(result: &AnswerResult) -> String {
    let mut out = result.response.clone();

    if !result.sources.is_empty() {
        out.push_str("\n\nSources:");
        for source in &result.sources {
            out.push_str(&format!("\n- {} <{}>", source.title, source.url));
        }
    }

    out
}
