use crate::error::{ApiError, ApiResult};
use crate::types::NewsResponse;
use crate::AppState;
use axum::http::StatusCode;
use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{error, info};

pub const NEWS_PAGE_SIZE: u32 = 10;

/// Articles older than this are not requested.
const LOOKBACK_DAYS: i64 = 30;

pub fn from_date(today: NaiveDate) -> String {
    (today - Duration::days(LOOKBACK_DAYS)).format("%Y-%m-%d").to_string()
}

/// Most popular articles of the last month matching `query`.
pub async fn everything(state: &Arc<AppState>, query: &str, page: u32) -> ApiResult<NewsResponse> {
    let api_key = state
        .config
        .news_api_key
        .as_deref()
        .ok_or(ApiError::NotConfigured("NEWS_API_KEY"))?;

    info!("Fetching news for: {} (page {})", query, page);
    let response = state
        .http_client
        .get(format!("{}/everything", state.config.upstream.news))
        .query(&[
            ("apiKey", api_key.to_string()),
            ("q", query.to_string()),
            ("from", from_date(Utc::now().date_naive())),
            ("sortBy", "popularity".to_string()),
            ("pageSize", NEWS_PAGE_SIZE.to_string()),
            ("page", page.to_string()),
        ])
        // NewsAPI rejects requests without a User-Agent.
        .header("User-Agent", "search-aggregator/0.1")
        .send()
        .await
        .map_err(|e| {
            error!("News request failed: {}", e);
            ApiError::upstream(StatusCode::INTERNAL_SERVER_ERROR, "An unexpected error occurred")
        })?;

    if !response.status().is_success() {
        return Err(ApiError::from_upstream(response.status()));
    }

    let news: NewsResponse = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse news response: {}", e))?;
    info!("NewsAPI returned {} articles", news.articles.len());
    Ok(news)
}
