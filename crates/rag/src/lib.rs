//! Encyclopedia-grounded question answering.
//!
//! Answers a conversational question from Wikipedia extracts: extract a
//! search topic, retrieve a few qualifying articles, assemble a grounded
//! (or explicitly empty) context, and generate a cited answer.

pub mod context;
pub mod encyclopedia;
pub mod generator;
pub mod pipeline;
pub mod topic;
pub mod types;
pub mod validation;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use context::{ContextAssembler, ContextBundle, InstructionVariant};
pub use encyclopedia::{
    filter_and_cap, EncyclopediaApi, EncyclopediaClient, RetrievalPolicy, SearchHit, WikipediaApi,
};
pub use generator::{AnswerGenerator, GenerationSettings};
pub use pipeline::{PipelineStage, Query, RagPipeline};
pub use topic::{clean_topic, TopicExtractor, TopicSettings};
pub use types::{
    session_title, AnswerResult, Article, ConversationTurn, InputMode, SourceRef, Topic, Utterance,
};
pub use validation::validate_query_text;
