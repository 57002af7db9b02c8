//! Search command handler.
//!
//! Runs only the retrieval policy for a topic, without any model calls.

use clap::Args;
use std::sync::Arc;
use wikivoice_core::{config::AppConfig, AppResult};
use wikivoice_rag::{EncyclopediaClient, RetrievalPolicy, Topic, WikipediaApi};

/// Show the articles that would ground a topic
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Search topic
    pub topic: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    /// Execute the search command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command");

        let api = Arc::new(WikipediaApi::new(&config.wikipedia)?);
        let client = EncyclopediaClient::new(api, RetrievalPolicy::from(&config.wikipedia));

        let articles = client.retrieve(&Topic::new(self.topic.trim())).await;

        if self.json {
            let json = serde_json::to_string_pretty(&articles)?;
            println!("{}", json);
            return Ok(());
        }

        if articles.is_empty() {
            println!("No qualifying articles found for '{}'", self.topic.trim());
            return Ok(());
        }

        for article in &articles {
            println!("{} ({} words)\n  {}", article.title, article.word_count, article.url);
        }

        Ok(())
    }
}
