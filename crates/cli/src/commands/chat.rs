//! Chat command handler.
//!
//! Interactive loop over stdin. The conversation is kept in memory for the
//! life of the process and fed back to the pipeline on every turn.

use super::{build_pipeline, render_answer};
use clap::Args;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use wikivoice_core::{config::AppConfig, AppResult};
use wikivoice_rag::{session_title, ConversationTurn, InputMode, Query};

/// Interactive conversation
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// How questions are captured (text, voice)
    #[arg(long, default_value = "text")]
    pub input_mode: InputMode,
}

impl ChatCommand {
    /// Execute the chat command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let pipeline = build_pipeline(config)?;
        let mut history: Vec<ConversationTurn> = Vec::new();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        eprintln!("Ask me anything. Type 'exit' to quit.");

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => None,
            };

            let Some(line) = line else {
                break;
            };

            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            if matches!(text, "exit" | "quit") {
                break;
            }

            if history.is_empty() {
                tracing::info!(title = %session_title(text), "Starting conversation");
            }

            let query = match Query::new(text, self.input_mode, history.clone()) {
                Ok(query) => query,
                Err(e) => {
                    eprintln!("{}", e.user_message());
                    continue;
                }
            };

            match pipeline.answer(&query).await {
                Ok(result) => {
                    println!("{}\n", render_answer(&result));
                    let turn = ConversationTurn::new(query.utterance.text(), result.response);
                    remember(&mut history, turn, config.pipeline.history_window);
                }
                Err(e) => eprintln!("{}", e.user_message()),
            }
        }

        tracing::info!(turns = history.len(), "Conversation ended");
        Ok(())
    }
}

/// Append a turn, keeping only the most recent `window` turns.
fn remember(history: &mut Vec<ConversationTurn>, turn: ConversationTurn, window: usize) {
    history.push(turn);
    if history.len() > window {
        let excess = history.len() - window;
        history.drain(..excess);
    }
}
