//! Configuration management for WikiVoice.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config files (.wikivoice/config.yaml or `WIKIVOICE_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! Later sources win. The result is passed explicitly to every component
//! that needs it; nothing reads configuration from global state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Providers the LLM factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["openai", "ollama"];

/// Main application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active LLM provider ("openai" or "ollama")
    pub provider: String,

    /// Model used for answer generation
    pub model: String,

    /// API key for the LLM provider
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub json_logs: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Encyclopedia service settings
    pub wikipedia: WikipediaConfig,

    /// Pipeline limits and timeouts
    pub pipeline: PipelineConfig,

    /// Directory with prompt overrides (`<id>.yml`)
    pub prompts_dir: Option<PathBuf>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("config_file", &self.config_file)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("log_level", &self.log_level)
            .field("verbose", &self.verbose)
            .field("no_color", &self.no_color)
            .field("json_logs", &self.json_logs)
            .field("llm", &self.llm)
            .field("wikipedia", &self.wikipedia)
            .field("pipeline", &self.pipeline)
            .field("prompts_dir", &self.prompts_dir)
            .finish()
    }
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        #[serde(rename = "topicModel")]
        topic_model: Option<String>,
        endpoint: Option<String>,
        timeout: Option<u64>,
    },
    Ollama {
        endpoint: String,
        model: String,
        #[serde(rename = "topicModel")]
        topic_model: Option<String>,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model used for answer generation.
    pub fn model(&self) -> &str {
        match self {
            Self::OpenAI { model, .. } | Self::Ollama { model, .. } => model,
        }
    }

    /// Model used for topic extraction, if configured separately.
    pub fn topic_model(&self) -> Option<&str> {
        match self {
            Self::OpenAI { topic_model, .. } | Self::Ollama { topic_model, .. } => {
                topic_model.as_deref()
            }
        }
    }

    /// Custom endpoint, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::OpenAI { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }

    /// HTTP timeout in seconds, if configured.
    pub fn timeout(&self) -> Option<u64> {
        match self {
            Self::OpenAI { timeout, .. } | Self::Ollama { timeout, .. } => *timeout,
        }
    }
}

/// Encyclopedia (Wikipedia) client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WikipediaConfig {
    /// MediaWiki action API endpoint
    pub endpoint: String,

    /// Prefix for human-facing article URLs
    pub article_base_url: String,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Number of candidates requested from search
    pub search_limit: usize,

    /// Articles with fewer body words are treated as stubs
    pub min_article_words: u64,

    /// Maximum number of articles used as grounding
    pub max_articles: usize,

    /// Number of leading sentences fetched per article
    pub extract_sentences: u32,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,

    /// Budget in seconds for one retrieval (search plus every extract fetch)
    pub budget_secs: u64,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://en.wikipedia.org/w/api.php".to_string(),
            article_base_url: "https://en.wikipedia.org/wiki/".to_string(),
            user_agent: concat!("WikiVoice/", env!("CARGO_PKG_VERSION"), " (reqwest)").to_string(),
            search_limit: 10,
            min_article_words: 500,
            max_articles: 3,
            extract_sentences: 10,
            timeout_secs: 10,
            budget_secs: 15,
        }
    }
}

impl WikipediaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs)
    }
}

/// Pipeline limits and per-stage timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Most recent conversation turns visible to the pipeline
    pub history_window: usize,

    /// Extracted topics longer than this are truncated
    pub topic_max_chars: usize,

    pub topic_timeout_secs: u64,
    pub generation_timeout_secs: u64,

    /// Deadline for a whole invocation
    pub request_timeout_secs: u64,

    pub topic_temperature: f32,
    pub topic_max_tokens: u32,
    pub answer_temperature: f32,
    pub answer_max_tokens: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_window: 5,
            topic_max_chars: 100,
            topic_timeout_secs: 10,
            generation_timeout_secs: 30,
            request_timeout_secs: 60,
            topic_temperature: 0.0,
            topic_max_tokens: 50,
            answer_temperature: 0.7,
            answer_max_tokens: 500,
        }
    }
}

impl PipelineConfig {
    pub fn topic_timeout(&self) -> Duration {
        Duration::from_secs(self.topic_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    llm: Option<LlmConfig>,
    wikipedia: Option<WikipediaConfig>,
    pipeline: Option<PipelineConfig>,
    logging: Option<LoggingConfig>,
    prompts_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            json_logs: false,
            llm: None,
            wikipedia: WikipediaConfig::default(),
            pipeline: PipelineConfig::default(),
            prompts_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default locations and the environment.
    ///
    /// Environment variables:
    /// - `WIKIVOICE_CONFIG`: Path to config file
    /// - `WIKIVOICE_PROVIDER`: LLM provider
    /// - `WIKIVOICE_MODEL`: Answer model identifier
    /// - `WIKIVOICE_API_KEY`: API key (takes precedence over provider key env)
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use wikivoice_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Provider: {}", config.provider);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None)
    }

    /// Load configuration, reading the given file instead of the default one.
    pub fn load_from(config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        config.config_file = config_file.or_else(|| {
            std::env::var("WIKIVOICE_CONFIG").ok().map(PathBuf::from)
        });

        let config_path = match config.config_file {
            Some(ref cf) => {
                if !cf.exists() {
                    return Err(AppError::Config(format!(
                        "Config file does not exist: {:?}",
                        cf
                    )));
                }
                Some(cf.clone())
            }
            None => {
                let default_path = PathBuf::from(".wikivoice/config.yaml");
                default_path.exists().then_some(default_path)
            }
        };

        if let Some(path) = config_path {
            config = config.merge_yaml(&path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("WIKIVOICE_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("WIKIVOICE_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("WIKIVOICE_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;

        let mut result = self.clone();

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.json_logs = json;
            }
        }

        if let Some(wikipedia) = config_file.wikipedia {
            result.wikipedia = wikipedia;
        }

        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }

        if let Some(dir) = config_file.prompts_dir {
            result.prompts_dir = Some(PathBuf::from(dir));
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            result.llm = Some(llm);
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and files.
    pub fn with_overrides(
        mut self,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        json_logs: bool,
    ) -> Self {
        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if json_logs {
            self.json_logs = true;
        }

        self
    }

    /// Get the configuration of a provider, if the config file declares one.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.providers.get(provider))
    }

    /// Endpoint override for the active provider.
    pub fn provider_endpoint(&self) -> Option<&str> {
        self.get_provider_config(&self.provider)
            .and_then(ProviderConfig::endpoint)
    }

    /// HTTP timeout for the active provider, falling back to the generation timeout.
    pub fn provider_timeout(&self) -> Duration {
        self.get_provider_config(&self.provider)
            .and_then(ProviderConfig::timeout)
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.pipeline.generation_timeout())
    }

    /// Model used for topic extraction; defaults to the answer model.
    pub fn topic_model(&self) -> String {
        self.get_provider_config(&self.provider)
            .and_then(ProviderConfig::topic_model)
            .unwrap_or(&self.model)
            .to_string()
    }

    /// Resolve API key from configuration or environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        let env_var = match self.get_provider_config(&self.provider) {
            Some(ProviderConfig::OpenAI { api_key_env, .. }) => Some(api_key_env.as_str()),
            Some(ProviderConfig::Ollama { .. }) => None,
            None if self.provider == "openai" => Some("OPENAI_API_KEY"),
            None => None,
        };

        env_var.and_then(|var| std::env::var(var).ok())
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = &self.provider;

        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider == "openai" && self.resolve_api_key().is_none() {
            return Err(AppError::Config(
                "OpenAI provider requires an API key (WIKIVOICE_API_KEY or OPENAI_API_KEY)"
                    .to_string(),
            ));
        }

        if self.wikipedia.max_articles == 0 || self.wikipedia.search_limit == 0 {
            return Err(AppError::Config(
                "wikipedia.maxArticles and wikipedia.searchLimit must be positive".to_string(),
            ));
        }

        if self.pipeline.topic_timeout_secs == 0
            || self.pipeline.generation_timeout_secs == 0
            || self.pipeline.request_timeout_secs == 0
            || self.wikipedia.timeout_secs == 0
            || self.wikipedia.budget_secs == 0
        {
            return Err(AppError::Config("Timeouts must be positive".to_string()));
        }

        // Every stage must be able to run to its own timeout before the request deadline
        let stages = self.pipeline.topic_timeout_secs
            + self.wikipedia.budget_secs
            + self.pipeline.generation_timeout_secs;
        if stages > self.pipeline.request_timeout_secs {
            return Err(AppError::Config(format!(
                "pipeline.topicTimeoutSecs + wikipedia.budgetSecs + pipeline.generationTimeoutSecs \
                 ({}s) exceeds pipeline.requestTimeoutSecs ({}s)",
                stages, self.pipeline.request_timeout_secs
            )));
        }

        Ok(())
    }
}
