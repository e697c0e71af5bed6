//! Typed HTTP client for the aggregator API, used by `search-cli`.

use crate::feed::{Cursor, Feed, Paged};
use crate::types::*;
use async_trait::async_trait;
use backoff::backoff::Constant;
use backoff::future::retry;
use futures::{Stream, StreamExt};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ClientError {
    /// Server-side and transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Api { status, .. } => *status >= 500,
            ClientError::Http(_) => true,
        }
    }
}

pub type ClientStream = Pin<Box<dyn Stream<Item = Result<String, ClientError>> + Send>>;

/// Runs `op`, repeating retryable failures up to `max_retries` more times
/// with `delay` in between.
pub async fn with_retries<T, F, Fut>(max_retries: u32, delay: Duration, mut op: F) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let attempts = AtomicU32::new(0);
    retry(Constant::new(delay), || {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let fut = op();
        async move {
            fut.await.map_err(|err| {
                if err.is_retryable() && attempt <= max_retries {
                    warn!("Attempt {} failed, retrying: {}", attempt, err);
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })
        }
    })
    .await
}

#[derive(Debug, Clone)]
pub struct AggregatorClient {
    http: Client,
    base_url: String,
}

impl AggregatorClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("Request failed").to_string());
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ClientError> {
        debug!("GET {} {:?}", path, query);
        let response = self.http.get(self.url(path)).query(query).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn post_stream<B: Serialize>(&self, path: &str, body: &B) -> Result<ClientStream, ClientError> {
        debug!("POST {}", path);
        let response = self.http.post(self.url(path)).json(body).send().await?;
        Ok(text_stream(Self::check(response).await?))
    }

    pub async fn health(&self) -> Result<Value, ClientError> {
        self.get_json("/health", &[]).await
    }

    pub async fn search(&self, query: &str, kind: SearchKind, page: u32) -> Result<SearchPage<SearchItem>, ClientError> {
        let mut params = vec![("q", query.to_string()), ("page", page.to_string())];
        if kind == SearchKind::Image {
            params.push(("type", "image".to_string()));
        }
        self.get_json("/api/search", &params).await
    }

    pub async fn complete(&self, query: &str) -> Result<Vec<String>, ClientError> {
        self.get_json("/api/complete", &[("q", query.to_string())]).await
    }

    pub async fn news(&self, query: &str, page: u32) -> Result<NewsResponse, ClientError> {
        self.get_json("/api/news", &[("q", query.to_string()), ("page", page.to_string())])
            .await
    }

    pub async fn videos(&self, query: &str, page_token: Option<&str>) -> Result<VideoResponse, ClientError> {
        let mut params = vec![("q", query.to_string())];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        self.get_json("/api/videos", &params).await
    }

    pub async fn weather(&self, city: Option<&str>) -> Result<CurrentWeather, ClientError> {
        let params: Vec<_> = city.map(|c| ("city", c.to_string())).into_iter().collect();
        self.get_json("/api/weather", &params).await
    }

    /// Looks a city up by name, or by the caller's address when `query` is `None`.
    pub async fn city(&self, query: Option<&str>) -> Result<City, ClientError> {
        let params: Vec<_> = query.map(|q| ("q", q.to_string())).into_iter().collect();
        self.get_json("/api/weather/city", &params).await
    }

    pub async fn summarize(&self, urls: Vec<String>, prompt: &str) -> Result<ClientStream, ClientError> {
        let request = SummarizeRequest {
            urls,
            prompt: prompt.to_string(),
        };
        self.post_stream("/api/scrape", &request).await
    }

    pub async fn answer(&self, query: &str) -> Result<ClientStream, ClientError> {
        let request = AnswerRequest {
            query: query.to_string(),
        };
        self.post_stream("/api/answer", &request).await
    }

    pub async fn ask(&self, prompt: &str) -> Result<ClientStream, ClientError> {
        let request = PromptRequest {
            prompt: prompt.to_string(),
        };
        self.post_stream("/api/gemini", &request).await
    }

    pub async fn render(&self, markdown: &str, classes: HashMap<String, String>) -> Result<String, ClientError> {
        let request = RenderRequest {
            markdown: markdown.to_string(),
            classes,
        };
        let response = self.http.post(self.url("/api/render")).json(&request).send().await?;
        let rendered: RenderResponse = Self::check(response).await?.json().await?;
        Ok(rendered.html)
    }

    /// Fetches the page after the last one in `feed`. Returns `false` when
    /// the feed is already exhausted.
    pub async fn load_more<R: FeedRequest>(&self, request: &R, feed: &mut Feed<R::Page>) -> Result<bool, ClientError> {
        let Some(cursor) = feed.next_cursor() else {
            return Ok(false);
        };
        let page = request.fetch(self, &cursor).await?;
        feed.push(cursor, page);
        Ok(true)
    }
}

/// Decodes a streamed body into text, holding back bytes of a character
/// split across chunks.
fn text_stream(response: Response) -> ClientStream {
    let stream = async_stream::stream! {
        let mut bytes = response.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();
        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(ClientError::Http(e));
                    break;
                }
            };
            pending.extend_from_slice(&chunk);
            let valid = match std::str::from_utf8(&pending) {
                Ok(text) => text.len(),
                Err(e) => e.valid_up_to(),
            };
            if valid > 0 {
                let text = String::from_utf8_lossy(&pending[..valid]).into_owned();
                pending.drain(..valid);
                yield Ok(text);
            }
        }
        if !pending.is_empty() {
            yield Ok(String::from_utf8_lossy(&pending).into_owned());
        }
    };
    Box::pin(stream)
}

/// One paginated endpoint and the query it is browsed with.
#[async_trait]
pub trait FeedRequest: Sync {
    type Page: Paged + Send;

    async fn fetch(&self, client: &AggregatorClient, cursor: &Cursor) -> Result<Self::Page, ClientError>;
}

pub struct SearchFeed {
    pub query: String,
    pub kind: SearchKind,
}

pub struct NewsFeed {
    pub query: String,
}

pub struct VideoFeed {
    pub query: String,
}

#[async_trait]
impl FeedRequest for SearchFeed {
    type Page = SearchPage<SearchItem>;

    async fn fetch(&self, client: &AggregatorClient, cursor: &Cursor) -> Result<Self::Page, ClientError> {
        client.search(&self.query, self.kind, cursor.page().unwrap_or(1)).await
    }
}

#[async_trait]
impl FeedRequest for NewsFeed {
    type Page = NewsResponse;

    async fn fetch(&self, client: &AggregatorClient, cursor: &Cursor) -> Result<Self::Page, ClientError> {
        client.news(&self.query, cursor.page().unwrap_or(1)).await
    }
}

#[async_trait]
impl FeedRequest for VideoFeed {
    type Page = VideoResponse;

    async fn fetch(&self, client: &AggregatorClient, cursor: &Cursor) -> Result<Self::Page, ClientError> {
        client.videos(&self.query, cursor.token()).await
    }
}
