use crate::error::{ApiError, ApiResult};
use crate::AppState;
use anyhow::anyhow;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

const BROWSER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Autocomplete suggestions for a partial query.
pub async fn suggestions(state: &Arc<AppState>, query: &str) -> ApiResult<Vec<String>> {
    if let Some(cached) = state.complete_cache.get(query).await {
        debug!("suggestion cache hit for {}", query);
        return Ok(cached);
    }

    info!("Fetching suggestions for: {}", query);
    let response = state
        .http_client
        .get(&state.config.upstream.google_complete)
        .query(&[("client", "firefox"), ("q", query)])
        .header("User-Agent", BROWSER_AGENT)
        .send()
        .await
        .map_err(|e| anyhow!("Failed to fetch suggestions: {}", e))?;

    if !response.status().is_success() {
        return Err(ApiError::from_upstream(response.status()));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| anyhow!("Failed to parse suggestions: {}", e))?;
    let suggestions = parse_suggestions(&body);

    state
        .complete_cache
        .insert(query.to_string(), suggestions.clone())
        .await;
    Ok(suggestions)
}

/// The firefox client answers `[query, [suggestion, ...], ...]`.
pub fn parse_suggestions(body: &Value) -> Vec<String> {
    body.get(1)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
