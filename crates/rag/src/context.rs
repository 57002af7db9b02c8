//! Context assembly.
//!
//! Pure transformation from retrieved articles and conversation history to
//! the exact message list the generator sends. The instruction variant is
//! chosen from the article list itself, so a bundle without articles always
//! carries the decline directive.

use crate::types::{Article, ConversationTurn};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use wikivoice_llm::ChatMessage;
use wikivoice_prompt::{
    render_prompt, PromptLibrary, ANSWER_EMPTY, ANSWER_GROUNDED, DECLINE_DIRECTIVE,
};

/// Name the assistant introduces itself with in system instructions.
pub const ASSISTANT_NAME: &str = "WikiVoice";

/// Which system instruction a bundle carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionVariant {
    /// Answer only from the supplied extracts, citing them
    Grounded,
    /// No articles: decline and suggest rephrasing
    EmptyContext,
}

impl InstructionVariant {
    pub fn prompt_id(&self) -> &'static str {
        match self {
            InstructionVariant::Grounded => ANSWER_GROUNDED,
            InstructionVariant::EmptyContext => ANSWER_EMPTY,
        }
    }
}

impl fmt::Display for InstructionVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstructionVariant::Grounded => write!(f, "grounded"),
            InstructionVariant::EmptyContext => write!(f, "empty-context"),
        }
    }
}

/// Everything the generator needs for one invocation.
#[derive(Debug, Clone)]
pub struct ContextBundle {
    /// Current utterance text
    pub question: String,

    /// Grounding articles in relevance order
    pub articles: Vec<Article>,

    /// Most recent turns, oldest first
    pub history: Vec<ConversationTurn>,

    pub variant: InstructionVariant,

    /// Rendered system instruction
    pub instruction: String,
}

impl ContextBundle {
    pub fn has_grounding(&self) -> bool {
        !self.articles.is_empty()
    }

    /// System instruction, then alternating prior turns, then the question.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2 + self.history.len() * 2);
        messages.push(ChatMessage::system(&self.instruction));
        for turn in &self.history {
            messages.push(ChatMessage::user(&turn.utterance));
            messages.push(ChatMessage::assistant(&turn.answer));
        }
        messages.push(ChatMessage::user(&self.question));
        messages
    }
}

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    prompts: Arc<PromptLibrary>,
    history_window: usize,
    max_articles: usize,
}

impl ContextAssembler {
    pub fn new(prompts: Arc<PromptLibrary>, history_window: usize, max_articles: usize) -> Self {
        Self {
            prompts,
            history_window,
            max_articles,
        }
    }

    /// Build the bundle for one question. Never fails.
    pub fn assemble(
        &self,
        question: &str,
        mut articles: Vec<Article>,
        history: &[ConversationTurn],
    ) -> ContextBundle {
        articles.truncate(self.max_articles);

        let start = history.len().saturating_sub(self.history_window);
        let history = history[start..].to_vec();

        let variant = if articles.is_empty() {
            InstructionVariant::EmptyContext
        } else {
            InstructionVariant::Grounded
        };

        let instruction = self.render_instruction(variant, &articles);

        tracing::debug!(
            variant = %variant,
            articles = articles.len(),
            history_turns = history.len(),
            "Assembled context"
        );

        ContextBundle {
            question: question.to_string(),
            articles,
            history,
            variant,
            instruction,
        }
    }

    fn render_instruction(&self, variant: InstructionVariant, articles: &[Article]) -> String {
        let vars = json!({
            "assistant": ASSISTANT_NAME,
            "decline": DECLINE_DIRECTIVE,
            "articles": articles,
        });

        let rendered = self
            .prompts
            .get(variant.prompt_id())
            .and_then(|definition| render_prompt(definition, &vars));

        match rendered {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(variant = %variant, "Falling back to plain instruction: {}", e);
                plain_instruction(variant, articles)
            }
        }
    }
}

fn plain_instruction(variant: InstructionVariant, articles: &[Article]) -> String {
    match variant {
        InstructionVariant::Grounded => {
            let context = articles
                .iter()
                .map(|article| format!("## {}\n{}", article.title, article.extract))
                .collect::<Vec<_>>()
                .join("\n\n");
            format!(
                "You are {}. Answer using ONLY the Wikipedia excerpts below and cite their titles. \
                 Do not use outside knowledge.\n\nWIKIPEDIA CONTEXT:\n{}",
                ASSISTANT_NAME, context
            )
        }
        InstructionVariant::EmptyContext => format!(
            "You are {}. No Wikipedia articles were found. Do not answer from your own knowledge. \
             Reply with: \"{}\"",
            ASSISTANT_NAME, DECLINE_DIRECTIVE
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikivoice_llm::ChatRole;
    use wikivoice_prompt::PromptDefinition;

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            url: format!("https://en.wikipedia.org/wiki/{}", title.replace(' ', "_")),
            extract: format!("{} is notable.", title),
            word_count: 1000,
        }
    }

    fn turns(n: usize) -> Vec<ConversationTurn> {
        (0..n)
            .map(|i| ConversationTurn::new(format!("q{}", i), format!("a{}", i)))
            .collect()
    }

    fn assembler() -> ContextAssembler {
        ContextAssembler::new(Arc::new(PromptLibrary::builtin()), 5, 3)
    }

    #[test]
    fn test_variant_matches_grounding() {
        let assembler = assembler();
        for count in 0..5 {
            let articles: Vec<_> = (0..count).map(|i| article(&format!("A{}", i))).collect();
            let bundle = assembler.assemble("question", articles, &[]);

            assert_eq!(
                bundle.articles.is_empty(),
                bundle.variant == InstructionVariant::EmptyContext
            );
            assert_eq!(
                bundle.instruction.contains(DECLINE_DIRECTIVE),
                !bundle.has_grounding()
            );
        }
    }

    #[test]
    fn test_grounded_instruction_lists_extracts() {
        let bundle = assembler().assemble(
            "Tell me about the Eiffel Tower",
            vec![article("Eiffel Tower")],
            &[],
        );

        assert_eq!(bundle.variant, InstructionVariant::Grounded);
        assert!(bundle.instruction.contains("## Eiffel Tower\nEiffel Tower is notable."));
        assert!(bundle.instruction.contains("ONLY"));
    }

    #[test]
    fn test_history_window_keeps_most_recent_in_order() {
        let assembler = assembler();
        for len in [0, 1, 5, 6, 12] {
            let history = turns(len);
            let bundle = assembler.assemble("now", vec![], &history);

            let expected = &history[len.saturating_sub(5)..];
            assert_eq!(bundle.history, expected);
        }
    }

    #[test]
    fn test_articles_capped() {
        let articles: Vec<_> = ["A", "B", "C", "D"].iter().map(|t| article(t)).collect();
        let bundle = assembler().assemble("q", articles, &[]);

        let titles: Vec<_> = bundle.articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_messages_alternate_roles() {
        let bundle = assembler().assemble("latest", vec![article("Rolex")], &turns(2));
        let messages = bundle.to_messages();

        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::System,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User,
            ]
        );
        assert_eq!(messages[1].content, "q0");
        assert_eq!(messages[5].content, "latest");
    }

    #[test]
    fn test_broken_template_still_declines() {
        let mut library = PromptLibrary::builtin();
        library
            .insert(PromptDefinition::new(
                ANSWER_EMPTY,
                "Broken",
                &[DECLINE_DIRECTIVE, " {{#each articles}}"].concat(),
            ))
            .unwrap();
        let assembler = ContextAssembler::new(Arc::new(library), 5, 3);

        let bundle = assembler.assemble("q", vec![], &[]);

        assert_eq!(bundle.variant, InstructionVariant::EmptyContext);
        assert!(bundle.instruction.contains(DECLINE_DIRECTIVE));
    }
}
