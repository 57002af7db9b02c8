//! RAG query orchestration.
//!
//! One invocation walks `ExtractingTopic -> Searching -> BuildingContext ->
//! Generating -> Done`. Only generation can end in `Errored`; the earlier
//! stages degrade instead (raw utterance as topic, zero articles). An
//! empty article list still goes through the generator with the
//! empty-context instruction.

use crate::context::ContextAssembler;
use crate::encyclopedia::{EncyclopediaApi, EncyclopediaClient, RetrievalPolicy};
use crate::generator::{AnswerGenerator, GenerationSettings};
use crate::topic::{TopicExtractor, TopicSettings};
use crate::types::{AnswerResult, ConversationTurn, InputMode, Topic, Utterance};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use wikivoice_core::{AppConfig, AppError, AppResult};
use wikivoice_llm::LlmClient;
use wikivoice_prompt::PromptLibrary;

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    ExtractingTopic,
    Searching,
    BuildingContext,
    Generating,
    Done,
    Errored,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::ExtractingTopic => "extracting_topic",
            PipelineStage::Searching => "searching",
            PipelineStage::BuildingContext => "building_context",
            PipelineStage::Generating => "generating",
            PipelineStage::Done => "done",
            PipelineStage::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// One inbound query: the utterance plus the conversation so far.
#[derive(Debug, Clone)]
pub struct Query {
    pub utterance: Utterance,

    /// Prior turns, oldest first. Only the most recent window is used.
    pub history: Vec<ConversationTurn>,
}

impl Query {
    pub fn new(text: &str, mode: InputMode, history: Vec<ConversationTurn>) -> AppResult<Self> {
        Ok(Self {
            utterance: Utterance::new(text, mode)?,
            history,
        })
    }
}

/// The query pipeline. Holds only client handles, so one instance can
/// serve concurrent invocations.
pub struct RagPipeline {
    extractor: TopicExtractor,
    encyclopedia: EncyclopediaClient,
    assembler: ContextAssembler,
    generator: AnswerGenerator,
    history_window: usize,
    request_timeout: Duration,
}

impl RagPipeline {
    pub fn new(
        extractor: TopicExtractor,
        encyclopedia: EncyclopediaClient,
        assembler: ContextAssembler,
        generator: AnswerGenerator,
        history_window: usize,
        request_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            encyclopedia,
            assembler,
            generator,
            history_window,
            request_timeout,
        }
    }

    /// Wire a pipeline from configuration and explicit client handles.
    pub fn from_config(
        config: &AppConfig,
        llm: Arc<dyn LlmClient>,
        encyclopedia: Arc<dyn EncyclopediaApi>,
        prompts: Arc<PromptLibrary>,
    ) -> Self {
        let pipeline = &config.pipeline;
        let policy = RetrievalPolicy::from(&config.wikipedia);

        let extractor = TopicExtractor::new(
            llm.clone(),
            prompts.clone(),
            TopicSettings {
                model: config.topic_model(),
                temperature: pipeline.topic_temperature,
                max_tokens: pipeline.topic_max_tokens,
                max_chars: pipeline.topic_max_chars,
                timeout: pipeline.topic_timeout(),
            },
        );

        let assembler =
            ContextAssembler::new(prompts, pipeline.history_window, policy.max_articles);

        let generator = AnswerGenerator::new(
            llm,
            GenerationSettings {
                model: config.model.clone(),
                temperature: pipeline.answer_temperature,
                max_tokens: pipeline.answer_max_tokens,
                timeout: pipeline.generation_timeout(),
            },
        );

        Self::new(
            extractor,
            EncyclopediaClient::new(encyclopedia, policy),
            assembler,
            generator,
            pipeline.history_window,
            pipeline.request_timeout(),
        )
    }

    pub fn encyclopedia(&self) -> &EncyclopediaClient {
        &self.encyclopedia
    }

    /// Answer one query, bounded by the request deadline.
    pub async fn answer(&self, query: &Query) -> AppResult<AnswerResult> {
        let span = tracing::info_span!(
            "rag_query",
            mode = %query.utterance.mode(),
            history = query.history.len()
        );

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.request_timeout, self.run(query))
            .instrument(span.clone())
            .await
            .unwrap_or_else(|_| {
                Err(AppError::RemoteTimeout(format!(
                    "request exceeded {:?}",
                    self.request_timeout
                )))
            });

        let _guard = span.enter();
        match &outcome {
            Ok(result) => tracing::info!(
                sources = result.sources.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Query answered"
            ),
            Err(e) => tracing::error!(
                code = e.code(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Query failed: {}",
                e
            ),
        }

        outcome
    }

    /// Like [`answer`](Self::answer), but abandons in-flight remote calls
    /// once `cancel` fires.
    pub async fn answer_cancellable(
        &self,
        query: &Query,
        cancel: CancellationToken,
    ) -> AppResult<AnswerResult> {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Query cancelled by caller");
                Err(AppError::Cancelled)
            }
            outcome = self.answer(query) => outcome,
        }
    }

    async fn run(&self, query: &Query) -> AppResult<AnswerResult> {
        let utterance = &query.utterance;
        let start = query.history.len().saturating_sub(self.history_window);
        let recent = &query.history[start..];

        transition(PipelineStage::ExtractingTopic);
        let (topic, topic_recovered) = match self.extractor.extract(utterance, recent).await {
            Ok(topic) => (topic, false),
            Err(e) => {
                tracing::warn!(code = e.code(), "Using raw utterance as topic: {}", e);
                (Topic::new(utterance.text()), true)
            }
        };

        transition(PipelineStage::Searching);
        let articles = self.encyclopedia.retrieve(&topic).await;

        transition(PipelineStage::BuildingContext);
        let bundle = self.assembler.assemble(utterance.text(), articles, recent);

        transition(PipelineStage::Generating);
        match self.generator.generate(&bundle).await {
            Ok(mut result) => {
                result.topic = topic.as_str().to_string();
                result.topic_recovered = topic_recovered;
                transition(PipelineStage::Done);
                Ok(result)
            }
            Err(e) => {
                transition(PipelineStage::Errored);
                Err(e)
            }
        }
    }
}

fn transition(stage: PipelineStage) {
    tracing::debug!(stage = %stage, "Pipeline transition");
}
