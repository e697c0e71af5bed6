//! Scrape, chunk and stream a model summary over a set of pages.

use crate::chunk::split_content;
use crate::error::{ApiError, ApiResult};
use crate::llm::{ChatModel, TextStream};
use crate::prompt::{answer_prompt, summary_prompt};
use crate::search::{search, SearchQuery};
use crate::types::{SearchKind, SummarizeRequest};
use crate::AppState;
use axum::http::StatusCode;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

/// Pages scraped per request; extra URLs are ignored.
pub const MAX_URLS: usize = 5;
/// Chunks placed into the prompt context.
pub const MAX_CHUNKS: usize = 20;
pub const MAX_PROMPT_CHARS: usize = 1000;

fn is_web_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

pub fn validate(request: &SummarizeRequest) -> ApiResult<()> {
    let mut details = Vec::new();
    if request.urls.is_empty() {
        details.push("urls: at least one URL is required".to_string());
    }
    for (i, url) in request.urls.iter().enumerate() {
        if !is_web_url(url) {
            details.push(format!("urls[{}]: invalid URL", i));
        }
    }
    if request.prompt.trim().is_empty() {
        details.push("prompt: must not be empty".to_string());
    }
    if details.is_empty() {
        Ok(())
    } else {
        Err(ApiError::InvalidInput(details))
    }
}

/// Scrapes up to [`MAX_URLS`] pages concurrently and joins their first
/// [`MAX_CHUNKS`] chunks into one context block.
pub async fn build_context(state: &Arc<AppState>, urls: &[String]) -> ApiResult<String> {
    let scrapes = urls.iter().take(MAX_URLS).map(|url| async move {
        let _permit = state.outbound_limit.acquire().await.ok();
        match state.scraper.scrape_website(url).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Dropping {}: {}", url, e);
                None
            }
        }
    });
    let texts: Vec<String> = join_all(scrapes)
        .await
        .into_iter()
        .flatten()
        .filter(|text| !text.trim().is_empty())
        .collect();

    if texts.is_empty() {
        return Err(ApiError::NoContent);
    }

    let context = texts
        .iter()
        .flat_map(|text| split_content(text))
        .take(MAX_CHUNKS)
        .map(|chunk| chunk.content)
        .collect::<Vec<_>>()
        .join("\n\n");
    info!("Built context from {} pages ({} chars)", texts.len(), context.len());
    Ok(context)
}

async fn start_stream(model: &Arc<dyn ChatModel>, prompt: &str) -> ApiResult<TextStream> {
    model.stream(prompt).await.map_err(|e| {
        error!("{} request failed: {:#}", model.name(), e);
        ApiError::upstream(
            StatusCode::BAD_GATEWAY,
            format!("The {} model could not be reached", model.name()),
        )
    })
}

pub async fn summarize_urls(state: &Arc<AppState>, request: SummarizeRequest) -> ApiResult<TextStream> {
    validate(&request)?;
    let model = state
        .summarizer
        .clone()
        .ok_or(ApiError::NotConfigured("COHERE_API_KEY"))?;

    info!("Summarizing {} URLs", request.urls.len());
    let context = build_context(state, &request.urls).await?;
    start_stream(&model, &summary_prompt(&context, &request.prompt)).await
}

/// Searches the web for `query` and summarizes the top results.
pub async fn answer_query(state: &Arc<AppState>, query: &str) -> ApiResult<TextStream> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ApiError::InvalidInput(vec!["query: must not be empty".to_string()]));
    }

    let page = search(
        state,
        &SearchQuery {
            query: query.to_string(),
            kind: SearchKind::Web,
            page: 1,
        },
    )
    .await?;
    let urls: Vec<String> = page
        .items
        .iter()
        .take(MAX_URLS)
        .map(|item| item.link().to_string())
        .collect();
    if urls.is_empty() {
        return Err(ApiError::NotFound("No search results found".to_string()));
    }

    summarize_urls(
        state,
        SummarizeRequest {
            urls,
            prompt: query.to_string(),
        },
    )
    .await
}

/// Streams a sourced answer to a free-form prompt.
pub async fn ask(state: &Arc<AppState>, prompt: &str) -> ApiResult<TextStream> {
    let length = prompt.chars().count();
    if length == 0 || length > MAX_PROMPT_CHARS {
        return Err(ApiError::InvalidInput(vec![format!(
            "prompt: must be between 1 and {} characters",
            MAX_PROMPT_CHARS
        )]));
    }
    let model = state
        .answerer
        .clone()
        .ok_or(ApiError::NotConfigured("GEMINI_API_KEY"))?;
    start_stream(&model, &answer_prompt(prompt)).await
}
