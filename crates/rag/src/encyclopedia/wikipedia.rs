//! MediaWiki action API adapter.
//!
//! API: https://www.mediawiki.org/wiki/API:Search and
//! https://www.mediawiki.org/wiki/Extension:TextExtracts

use super::{EncyclopediaApi, SearchHit};
use serde::Deserialize;
use wikivoice_core::config::WikipediaConfig;
use wikivoice_core::{AppError, AppResult};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    title: String,
    #[serde(default)]
    wordcount: u64,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    query: Option<ExtractQuery>,
}

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: Vec<ExtractPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractPage {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    extract: Option<String>,
}

/// Wikipedia over HTTP.
pub struct WikipediaApi {
    endpoint: String,
    article_base_url: String,
    client: reqwest::Client,
}

impl WikipediaApi {
    pub fn new(config: &WikipediaConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            article_base_url: config.article_base_url.clone(),
            client,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, params: &[(&str, String)]) -> AppResult<T> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::RemoteTimeout(format!("Wikipedia request timed out: {}", e))
                } else {
                    AppError::Encyclopedia(format!("Wikipedia request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Encyclopedia(format!(
                "Wikipedia API error ({})",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Encyclopedia(format!("Malformed Wikipedia response: {}", e)))
    }
}

#[async_trait::async_trait]
impl EncyclopediaApi for WikipediaApi {
    async fn search(&self, query: &str, limit: usize) -> AppResult<Vec<SearchHit>> {
        let params = [
            ("action", "query".to_string()),
            ("list", "search".to_string()),
            ("srsearch", query.to_string()),
            ("srlimit", limit.to_string()),
            ("srprop", "wordcount".to_string()),
            ("format", "json".to_string()),
        ];

        let response: SearchResponse = self.get(&params).await?;

        let hits = response
            .query
            .map(|q| q.search)
            .unwrap_or_default()
            .into_iter()
            .map(|entry| SearchHit {
                title: entry.title,
                word_count: entry.wordcount,
            })
            .collect::<Vec<_>>();

        for hit in &hits {
            tracing::debug!(title = %hit.title, words = hit.word_count, "Wikipedia search result");
        }

        Ok(hits)
    }

    async fn fetch_extract(&self, title: &str, sentences: u32) -> AppResult<Option<String>> {
        let params = [
            ("action", "query".to_string()),
            ("prop", "extracts".to_string()),
            ("titles", title.to_string()),
            ("exsentences", sentences.to_string()),
            ("explaintext", "1".to_string()),
            ("redirects", "1".to_string()),
            ("format", "json".to_string()),
            ("formatversion", "2".to_string()),
        ];

        let response: ExtractResponse = self.get(&params).await?;

        Ok(response
            .query
            .map(|q| q.pages)
            .unwrap_or_default()
            .into_iter()
            .filter(|page| !page.missing)
            .find_map(|page| page.extract))
    }

    fn article_url(&self, title: &str) -> String {
        format!("{}{}", self.article_base_url, title.replace(' ', "_"))
    }
}
