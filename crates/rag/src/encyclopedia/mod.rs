//! Encyclopedia retrieval.
//!
//! [`EncyclopediaApi`] is the raw remote service: it may fail, time out, or
//! return odd data. [`EncyclopediaClient`] wraps it with the retrieval
//! policy and never lets a remote failure escape; failures turn into fewer
//! (possibly zero) articles.

pub mod wikipedia;

pub use wikipedia::WikipediaApi;

use crate::types::{Article, Topic};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use wikivoice_core::config::WikipediaConfig;
use wikivoice_core::{AppError, AppResult};

/// A search candidate, in the service's relevance order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,

    /// Word count of the full article body
    pub word_count: u64,
}

/// Remote encyclopedia operations.
#[async_trait::async_trait]
pub trait EncyclopediaApi: Send + Sync {
    /// Search by keyword, returning at most `limit` candidates ranked by relevance.
    async fn search(&self, query: &str, limit: usize) -> AppResult<Vec<SearchHit>>;

    /// Fetch the first `sentences` sentences of an article as plain text.
    ///
    /// `Ok(None)` means the article exists in search but has no extract.
    async fn fetch_extract(&self, title: &str, sentences: u32) -> AppResult<Option<String>>;

    /// Public URL of an article.
    fn article_url(&self, title: &str) -> String;
}

/// Retrieval limits.
#[derive(Debug, Clone)]
pub struct RetrievalPolicy {
    pub search_limit: usize,
    pub min_article_words: u64,
    pub max_articles: usize,
    pub extract_sentences: u32,

    /// Per-call timeout
    pub timeout: Duration,

    /// Whole-retrieval budget; articles gathered before it runs out are kept
    pub budget: Duration,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self::from(&WikipediaConfig::default())
    }
}

impl From<&WikipediaConfig> for RetrievalPolicy {
    fn from(config: &WikipediaConfig) -> Self {
        Self {
            search_limit: config.search_limit,
            min_article_words: config.min_article_words,
            max_articles: config.max_articles,
            extract_sentences: config.extract_sentences,
            timeout: config.timeout(),
            budget: config.budget(),
        }
    }
}

/// Drop stub articles and duplicate urls, then keep the first `max_articles`.
///
/// Order is preserved, so applying this to its own output changes nothing.
pub fn filter_and_cap(
    articles: Vec<Article>,
    min_article_words: u64,
    max_articles: usize,
) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|article| article.word_count >= min_article_words)
        .filter(|article| !article.extract.trim().is_empty())
        .filter(|article| seen.insert(article.url.clone()))
        .take(max_articles)
        .collect()
}

/// Policy layer over an [`EncyclopediaApi`].
#[derive(Clone)]
pub struct EncyclopediaClient {
    api: Arc<dyn EncyclopediaApi>,
    policy: RetrievalPolicy,
}

impl EncyclopediaClient {
    pub fn new(api: Arc<dyn EncyclopediaApi>, policy: RetrievalPolicy) -> Self {
        Self { api, policy }
    }

    pub fn policy(&self) -> &RetrievalPolicy {
        &self.policy
    }

    /// Ranked candidates for a topic. A failed or timed-out search yields none.
    pub async fn search(&self, topic: &Topic) -> Vec<SearchHit> {
        let call = self.api.search(topic.as_str(), self.policy.search_limit);

        match with_timeout(self.policy.timeout, "search", call).await {
            Ok(hits) => {
                tracing::debug!(
                    topic = %topic,
                    candidates = hits.len(),
                    "Encyclopedia search returned"
                );
                hits
            }
            Err(e) => {
                tracing::warn!(
                    topic = %topic,
                    code = e.code(),
                    "Encyclopedia search failed: {}",
                    e
                );
                Vec::new()
            }
        }
    }

    /// Extract for one candidate, or `None` when it is a stub, has no
    /// content, or the fetch fails.
    pub async fn fetch_extract(&self, hit: &SearchHit) -> Option<Article> {
        if hit.word_count < self.policy.min_article_words {
            tracing::debug!(
                title = %hit.title,
                words = hit.word_count,
                "Skipping stub article"
            );
            return None;
        }

        let call = self.api.fetch_extract(&hit.title, self.policy.extract_sentences);

        match with_timeout(self.policy.timeout, "extract", call).await {
            Ok(Some(extract)) if !extract.trim().is_empty() => Some(Article {
                title: hit.title.clone(),
                url: self.api.article_url(&hit.title),
                extract: extract.trim().to_string(),
                word_count: hit.word_count,
            }),
            Ok(_) => {
                tracing::debug!(title = %hit.title, "Article has no extract");
                None
            }
            Err(e) => {
                tracing::warn!(
                    title = %hit.title,
                    code = e.code(),
                    "Extract fetch failed: {}",
                    e
                );
                None
            }
        }
    }

    /// Articles grounding a topic, in relevance order, at most `max_articles`.
    ///
    /// Candidates are fetched concurrently in windows sized to the remaining
    /// capacity; each window is recombined in relevance order before the
    /// next one starts. Once the retrieval budget is spent, whatever has
    /// been gathered is returned.
    pub async fn retrieve(&self, topic: &Topic) -> Vec<Article> {
        let deadline = Instant::now() + self.policy.budget;

        let hits = match tokio::time::timeout_at(deadline, self.search(topic)).await {
            Ok(hits) => hits,
            Err(_) => {
                tracing::warn!(topic = %topic, "Retrieval budget spent during search");
                Vec::new()
            }
        };

        let mut seen_urls = HashSet::new();
        let candidates: Vec<&SearchHit> = hits
            .iter()
            .filter(|hit| hit.word_count >= self.policy.min_article_words)
            .filter(|hit| seen_urls.insert(self.api.article_url(&hit.title)))
            .collect();

        tracing::debug!(
            qualifying = candidates.len(),
            filtered = hits.len() - candidates.len(),
            "Applied word-count floor and url dedup"
        );

        let mut articles = Vec::with_capacity(self.policy.max_articles);
        let mut remaining = candidates.as_slice();

        while articles.len() < self.policy.max_articles && !remaining.is_empty() {
            let window = (self.policy.max_articles - articles.len()).min(remaining.len());
            let (batch, rest) = remaining.split_at(window);
            remaining = rest;

            let fetched = join_all(
                batch
                    .iter()
                    .map(|hit| tokio::time::timeout_at(deadline, self.fetch_extract(hit))),
            )
            .await;
            articles.extend(fetched.into_iter().flatten().flatten());

            if Instant::now() >= deadline {
                tracing::warn!(
                    topic = %topic,
                    gathered = articles.len(),
                    "Retrieval budget spent, keeping articles gathered so far"
                );
                break;
            }
        }

        let articles = filter_and_cap(
            articles,
            self.policy.min_article_words,
            self.policy.max_articles,
        );

        tracing::info!(topic = %topic, articles = articles.len(), "Retrieved grounding articles");
        articles
    }
}

async fn with_timeout<T>(
    timeout: Duration,
    operation: &str,
    call: impl std::future::Future<Output = AppResult<T>>,
) -> AppResult<T> {
    tokio::time::timeout(timeout, call).await.map_err(|_| {
        AppError::RemoteTimeout(format!("encyclopedia {} exceeded {:?}", operation, timeout))
    })?
}
