//! Ask command handler.
//!
//! Runs one pipeline invocation, optionally continuing a conversation
//! loaded from a JSON history file.

use super::{build_pipeline, render_answer};
use clap::Args;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use wikivoice_core::{config::AppConfig, AppError, AppResult};
use wikivoice_rag::{ConversationTurn, InputMode, Query};

/// Ask a single question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// JSON file with prior turns: [{"utterance": ..., "answer": ...}]
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// How the question was captured (text, voice)
    #[arg(long, default_value = "text")]
    pub input_mode: InputMode,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let history = match &self.history {
            Some(path) => load_history(path)?,
            None => Vec::new(),
        };

        let query = Query::new(&self.question, self.input_mode, history)?;
        let pipeline = build_pipeline(config)?;

        // Ctrl-C abandons the in-flight remote calls
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                trigger.cancel();
            }
        });

        let result = pipeline.answer_cancellable(&query, cancel).await?;

        if result.topic_recovered {
            tracing::debug!("Answered using the raw question as search topic");
        }

        if self.json {
            let json = serde_json::to_string_pretty(&result)?;
            println!("{}", json);
        } else {
            println!("{}", render_answer(&result));
        }

        Ok(())
    }
}

/// Read prior turns from a JSON file.
pub(crate) fn load_history(path: &Path) -> AppResult<Vec<ConversationTurn>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Failed to read history file {:?}: {}", path, e))
    })?;

    let turns: Vec<ConversationTurn> = serde_json::from_str(&contents)?;
    tracing::debug!("Loaded {} history turns from {:?}", turns.len(), path);
    Ok(turns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_history() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history.json");
        fs::write(
            &path,
            r#"[{"utterance": "Tell me about the Eiffel Tower", "answer": "It is in Paris."}]"#,
        )
        .unwrap();

        let turns = load_history(&path).unwrap();
        assert_eq!(
            turns,
            vec![ConversationTurn::new("Tell me about the Eiffel Tower", "It is in Paris.")]
        );
    }

    #[test]
    fn test_load_history_errors() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            load_history(&temp.path().join("missing.json")),
            Err(AppError::Config(_))
        ));

        let path = temp.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_history(&path), Err(AppError::Serialization(_))));
    }
}
