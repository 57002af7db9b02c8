//! In-memory stand-ins for the remote services.

use crate::encyclopedia::{EncyclopediaApi, SearchHit};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wikivoice_core::{AppError, AppResult};
use wikivoice_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};

#[derive(Debug, Clone)]
enum Fetch {
    Ok,
    Fail,
    Slow(Duration),
}

#[derive(Debug, Clone)]
struct Entry {
    title: String,
    words: u64,
    fetch: Fetch,
}

/// Encyclopedia whose search returns its articles in insertion order.
#[derive(Debug, Clone, Default)]
pub struct FakeEncyclopedia {
    entries: Vec<Entry>,
    search_fails: bool,
    searched: Arc<Mutex<Vec<String>>>,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl FakeEncyclopedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_article(self, title: &str, words: u64) -> Self {
        self.push(title, words, Fetch::Ok)
    }

    pub fn with_failing_article(self, title: &str, words: u64) -> Self {
        self.push(title, words, Fetch::Fail)
    }

    pub fn with_slow_article(self, title: &str, words: u64, delay: Duration) -> Self {
        self.push(title, words, Fetch::Slow(delay))
    }

    pub fn failing_search(mut self) -> Self {
        self.search_fails = true;
        self
    }

    /// Queries passed to `search`, in call order.
    pub fn searched(&self) -> Vec<String> {
        self.searched.lock().unwrap().clone()
    }

    /// Titles passed to `fetch_extract`, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn extract_for(title: &str) -> String {
        format!("{} is the subject of this article.", title)
    }

    fn push(mut self, title: &str, words: u64, fetch: Fetch) -> Self {
        self.entries.push(Entry {
            title: title.to_string(),
            words,
            fetch,
        });
        self
    }
}

#[async_trait::async_trait]
impl EncyclopediaApi for FakeEncyclopedia {
    async fn search(&self, query: &str, limit: usize) -> AppResult<Vec<SearchHit>> {
        self.searched.lock().unwrap().push(query.to_string());

        if self.search_fails {
            return Err(AppError::Encyclopedia("search unavailable".to_string()));
        }

        Ok(self
            .entries
            .iter()
            .take(limit)
            .map(|entry| SearchHit {
                title: entry.title.clone(),
                word_count: entry.words,
            })
            .collect())
    }

    async fn fetch_extract(&self, title: &str, _sentences: u32) -> AppResult<Option<String>> {
        self.fetched.lock().unwrap().push(title.to_string());

        let Some(entry) = self.entries.iter().find(|entry| entry.title == title) else {
            return Ok(None);
        };

        match entry.fetch {
            Fetch::Ok => Ok(Some(Self::extract_for(title))),
            Fetch::Fail => Err(AppError::Encyclopedia(format!("fetch failed for {}", title))),
            Fetch::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(Some(Self::extract_for(title)))
            }
        }
    }

    fn article_url(&self, title: &str) -> String {
        format!("https://en.wikipedia.org/wiki/{}", title.replace(' ', "_"))
    }
}

/// Canned behaviour for one model.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail,
    /// Never completes; the caller's timeout must fire
    Hang,
}

/// LLM that answers per model name and records every request.
#[derive(Debug, Clone, Default)]
pub struct FakeLlm {
    replies: HashMap<String, Reply>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
}

impl FakeLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_model(mut self, model: &str, reply: Reply) -> Self {
        self.replies.insert(model.to_string(), reply);
        self
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, model: &str) -> Vec<LlmRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.model == model)
            .collect()
    }
}

#[async_trait::async_trait]
impl LlmClient for FakeLlm {
    fn provider_name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());

        match self.replies.get(&request.model) {
            Some(Reply::Text(text)) => Ok(LlmResponse {
                content: text.clone(),
                model: request.model.clone(),
                usage: LlmUsage::new(10, 10),
            }),
            Some(Reply::Fail) => Err(AppError::Llm("upstream returned 500".to_string())),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(AppError::Llm("unreachable".to_string()))
            }
            None => Err(AppError::Llm(format!("no reply for model {}", request.model))),
        }
    }
}
