pub mod chunk;
pub mod client;
pub mod complete;
pub mod config;
pub mod error;
pub mod feed;
pub mod format;
pub mod kv;
pub mod llm;
pub mod news;
pub mod prompt;
pub mod rate_limit;
pub mod routes;
pub mod scrape;
pub mod search;
pub mod summarize;
pub mod types;
pub mod videos;
pub mod weather;

use std::sync::Arc;
use std::time::Duration;

use config::Config;
use kv::{KvStore, MemoryStore};
use llm::{ChatModel, CohereModel, GeminiModel};
use rate_limit::RateLimiter;
use scrape::Scraper;

pub use types::*;

/// Rate-limit counters live apart from the response cache so cache churn
/// cannot evict them.
const RATE_LIMIT_CAPACITY: u64 = 100_000;

/// Model streams run far longer than any proxied call; only connecting is bounded.
const MODEL_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub http_client: reqwest::Client,
    // Cached search pages
    pub store: Arc<dyn KvStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub complete_cache: moka::future::Cache<String, Vec<String>>, // key: partial query
    pub scraper: Scraper,
    // Concurrency control for external calls
    pub outbound_limit: Arc<tokio::sync::Semaphore>,
    /// Summarizes scraped pages. `None` when no Cohere key is set.
    pub summarizer: Option<Arc<dyn ChatModel>>,
    /// Answers free-form prompts. `None` when no Gemini key is set.
    pub answerer: Option<Arc<dyn ChatModel>>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        let model_client = reqwest::Client::builder()
            .connect_timeout(MODEL_CONNECT_TIMEOUT)
            .build()?;

        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::default());
        let rate_limiter = Arc::new(RateLimiter::new(
            Arc::new(MemoryStore::new(RATE_LIMIT_CAPACITY)),
            config.rate_limit_max,
            config.rate_limit_window,
        ));

        let summarizer = config.cohere_api_key.as_ref().map(|key| {
            Arc::new(CohereModel::new(
                model_client.clone(),
                config.upstream.cohere.clone(),
                key.clone(),
            )) as Arc<dyn ChatModel>
        });
        let answerer = config.gemini_api_key.as_ref().map(|key| {
            Arc::new(GeminiModel::new(
                model_client.clone(),
                config.upstream.gemini.clone(),
                key.clone(),
            )) as Arc<dyn ChatModel>
        });

        Ok(Self {
            http_client,
            store,
            rate_limiter,
            complete_cache: moka::future::Cache::builder()
                .max_capacity(100)
                .time_to_live(Duration::from_secs(60 * 5))
                .build(),
            scraper: Scraper::new()?,
            outbound_limit: Arc::new(tokio::sync::Semaphore::new(32)),
            summarizer,
            answerer,
            config,
        })
    }

    /// Replaces the configured language models.
    pub fn with_models(
        mut self,
        summarizer: Option<Arc<dyn ChatModel>>,
        answerer: Option<Arc<dyn ChatModel>>,
    ) -> Self {
        self.summarizer = summarizer;
        self.answerer = answerer;
        self
    }
}
