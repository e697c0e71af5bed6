use crate::error::{upstream_status, ApiError, ApiResult};
use crate::types::*;
use crate::AppState;
use anyhow::anyhow;
use axum::http::StatusCode;
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const RESULTS_PER_PAGE: u32 = 10;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub kind: SearchKind,
    pub page: u32,
}

impl SearchQuery {
    pub fn cache_key(&self) -> String {
        format!("search:{}:{}:{}", self.query, self.kind.as_param(), self.page)
    }

    /// 1-based index of the first result on this page, `None` when the
    /// page number is zero or too large to address.
    pub fn start_index(&self) -> Option<u32> {
        self.page
            .checked_sub(1)?
            .checked_mul(RESULTS_PER_PAGE)?
            .checked_add(1)
    }
}

/// Failure of one upstream attempt, before it is classified for the caller.
#[derive(Debug)]
enum Attempt {
    Network(reqwest::Error),
    Status { status: StatusCode, body: String },
    Decode(reqwest::Error),
}

pub async fn search(state: &Arc<AppState>, query: &SearchQuery) -> ApiResult<SearchPage<SearchItem>> {
    info!("Searching for: {} ({:?}, page {})", query.query, query.kind, query.page);
    let start = query
        .start_index()
        .ok_or_else(|| ApiError::BadRequest("Invalid request parameters".to_string()))?;
    let api_key = state
        .config
        .google_api_key
        .as_deref()
        .ok_or(ApiError::NotConfigured("GOOGLE_API_KEY"))?;
    let cx = state
        .config
        .google_cx
        .as_deref()
        .ok_or(ApiError::NotConfigured("GOOGLE_CX"))?;

    // Cache hit fast-path
    let cache_key = query.cache_key();
    if let Some(cached) = state.store.get(&cache_key).await {
        match serde_json::from_str::<SearchPage<SearchItem>>(&cached) {
            Ok(page) => {
                debug!("search cache hit for {}", cache_key);
                return Ok(page);
            }
            Err(e) => warn!("Dropping unreadable cache entry {}: {}", cache_key, e),
        }
    }

    let mut params: Vec<(&str, String)> = vec![
        ("key", api_key.to_string()),
        ("cx", cx.to_string()),
        ("q", query.query.clone()),
        ("start", start.to_string()),
        ("num", RESULTS_PER_PAGE.to_string()),
    ];
    if query.kind == SearchKind::Image {
        params.push(("searchType", "image".to_string()));
    }

    let page = match query.kind {
        SearchKind::Web => {
            let raw: GoogleSearchResponse<GoogleWebItem> = fetch_with_retry(state, &params).await?;
            let items = raw.items.unwrap_or_default().into_iter().map(|i| SearchItem::Web(web_item(i))).collect();
            build_page(raw.search_information, items, raw.queries, query.page)
        }
        SearchKind::Image => {
            let raw: GoogleSearchResponse<GoogleImageItem> = fetch_with_retry(state, &params).await?;
            let items = raw.items.unwrap_or_default().into_iter().map(|i| SearchItem::Image(image_item(i))).collect();
            build_page(raw.search_information, items, raw.queries, query.page)
        }
    };

    info!("Google returned {} results", page.items.len());
    match serde_json::to_string(&page) {
        Ok(json) => state.store.set(&cache_key, json, state.config.search_cache_ttl).await,
        Err(e) => warn!("Could not cache search page: {}", e),
    }
    Ok(page)
}

async fn fetch_with_retry<T: DeserializeOwned>(
    state: &Arc<AppState>,
    params: &[(&str, String)],
) -> ApiResult<T> {
    // Acquire rate limiter permit
    let _permit = state
        .outbound_limit
        .acquire()
        .await
        .map_err(|e| ApiError::Internal(anyhow!("outbound limiter closed: {}", e)))?;

    let client = state.http_client.clone();
    let url = state.config.upstream.google_search.clone();
    let result = retry(
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_interval(Duration::from_secs(2))
            .with_max_elapsed_time(Some(Duration::from_secs(4)))
            .build(),
        || {
            let client = client.clone();
            let url = url.clone();
            async move {
                let resp = client
                    .get(&url)
                    .query(params)
                    .timeout(SEARCH_TIMEOUT)
                    .header("Accept", "application/json")
                    .send()
                    .await
                    .map_err(|e| backoff::Error::transient(Attempt::Network(e)))?;
                let status = resp.status();
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    let err = Attempt::Status {
                        status: upstream_status(status),
                        body,
                    };
                    // 5xx transient, others permanent
                    return if status.is_server_error() {
                        Err(backoff::Error::transient(err))
                    } else {
                        Err(backoff::Error::permanent(err))
                    };
                }
                resp.json::<T>()
                    .await
                    .map_err(|e| backoff::Error::permanent(Attempt::Decode(e)))
            }
        },
    )
    .await;

    result.map_err(classify)
}

fn classify(attempt: Attempt) -> ApiError {
    match attempt {
        Attempt::Network(e) => {
            warn!("Search request failed: {}", e);
            ApiError::upstream(
                StatusCode::INTERNAL_SERVER_ERROR,
                "A network error occurred while fetching search results",
            )
        }
        Attempt::Decode(e) => ApiError::Internal(anyhow!("Failed to parse search response: {}", e)),
        Attempt::Status { status, body } => classify_google_error(status, &body),
    }
}

/// Maps a Google API error body to the status and message shown to users.
pub fn classify_google_error(status: StatusCode, body: &str) -> ApiError {
    let Ok(parsed) = serde_json::from_str::<GoogleErrorBody>(body) else {
        if body.contains("dailyLimitExceeded") {
            return ApiError::upstream(StatusCode::TOO_MANY_REQUESTS, "Google search API daily limit exceeded");
        }
        return ApiError::upstream(status, "An error occurred while processing the API response");
    };
    let detail = parsed.error;
    match detail.status.as_deref() {
        Some("RESOURCE_EXHAUSTED") => {
            let message = if detail.message.contains("dailyLimitExceeded") {
                "Daily quota for Google search API has been exceeded"
            } else {
                "API quota has been exhausted"
            };
            ApiError::upstream(StatusCode::TOO_MANY_REQUESTS, message)
        }
        Some("PERMISSION_DENIED") => ApiError::upstream(
            StatusCode::FORBIDDEN,
            "Permission denied. Please check API key and permissions",
        ),
        Some("INVALID_ARGUMENT") => ApiError::upstream(StatusCode::BAD_REQUEST, "Invalid request parameters"),
        _ => {
            let code = detail
                .code
                .and_then(|c| StatusCode::from_u16(c).ok())
                .unwrap_or(status);
            let message = if detail.message.is_empty() {
                "An error occurred with the Google API".to_string()
            } else {
                detail.message
            };
            ApiError::upstream(code, message)
        }
    }
}

fn build_page(
    info: SearchInformation,
    items: Vec<SearchItem>,
    queries: GoogleQueries,
    page: u32,
) -> SearchPage<SearchItem> {
    let total_results = info.total_results.parse().unwrap_or(0);
    SearchPage {
        search_information: info,
        items,
        pagination: Pagination {
            current_page: page,
            total_results,
            results_per_page: RESULTS_PER_PAGE,
            has_next_page: queries.next_page.is_some(),
        },
    }
}

fn metatag(tags: Option<&std::collections::HashMap<String, serde_json::Value>>, name: &str) -> Option<String> {
    tags.and_then(|t| t.get(name))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

pub fn web_item(item: GoogleWebItem) -> WebSearchItem {
    let pagemap = item.pagemap.unwrap_or_default();
    let tags = pagemap.metatags.first();
    let thumbnail = pagemap.cse_thumbnail.into_iter().next();

    WebSearchItem {
        title: item.title,
        html_title: item.html_title,
        link: item.link,
        display_link: item.display_link,
        snippet: item.snippet,
        html_snippet: item.html_snippet,
        formatted_url: item.formatted_url,
        html_formatted_url: item.html_formatted_url,
        thumbnail_url: thumbnail.as_ref().map(|t| t.src.clone()),
        thumbnail_width: thumbnail.as_ref().and_then(|t| t.width.clone()),
        thumbnail_height: thumbnail.as_ref().and_then(|t| t.height.clone()),
        image_url: pagemap.cse_image.into_iter().next().map(|i| i.src),
        date_published: metatag(tags, "date"),
        author: metatag(tags, "author"),
        description: metatag(tags, "og:description").or_else(|| metatag(tags, "description")),
        site_name: metatag(tags, "og:site_name"),
        metadata: Some(WebsiteMetadata {
            title: metatag(tags, "og:title"),
            description: metatag(tags, "og:description"),
            og_image: metatag(tags, "og:image"),
        }),
        hcard: pagemap.hcard.into_iter().next(),
    }
}

pub fn image_item(item: GoogleImageItem) -> ImageSearchItem {
    ImageSearchItem {
        title: item.title,
        html_title: item.html_title,
        link: item.link,
        display_link: item.display_link,
        mime: item.mime,
        file_format: item.file_format,
        context_link: item.image.context_link,
        image_height: item.image.height,
        image_width: item.image.width,
        byte_size: item.image.byte_size,
        thumbnail_link: item.image.thumbnail_link,
        thumbnail_height: item.image.thumbnail_height,
        thumbnail_width: item.image.thumbnail_width,
        snippet: item.snippet,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn state_for(server: &Server) -> Arc<AppState> {
        let mut config = Config::default();
        config.google_api_key = Some("key".into());
        config.google_cx = Some("cx".into());
        config.upstream.google_search = format!("{}/customsearch/v1", server.url());
        Arc::new(AppState::new(config).unwrap())
    }

    fn query(kind: SearchKind, page: u32) -> SearchQuery {
        SearchQuery {
            query: "rust".to_string(),
            kind,
            page,
        }
    }

    #[test]
    fn test_start_index_and_cache_key() {
        let q = query(SearchKind::Web, 3);
        assert_eq!(q.start_index(), Some(21));
        assert_eq!(query(SearchKind::Web, 1).start_index(), Some(1));
        assert_eq!(q.cache_key(), "search:rust:searchTypeUndefined:3");
        assert_eq!(query(SearchKind::Image, 1).cache_key(), "search:rust:image:1");
    }

    #[test]
    fn test_web_item_reads_pagemap() {
        let raw: GoogleWebItem = serde_json::from_value(json!({
            "title": "Rust", "htmlTitle": "<b>Rust</b>", "link": "https://rust-lang.org",
            "displayLink": "rust-lang.org", "snippet": "A language", "htmlSnippet": "A language",
            "formattedUrl": "https://rust-lang.org", "htmlFormattedUrl": "https://rust-lang.org",
            "pagemap": {
                "cse_thumbnail": [{"src": "https://t/1.png", "width": "100", "height": "50"}],
                "cse_image": [{"src": "https://i/1.png"}],
                "metatags": [{"description": "plain", "og:site_name": "Rust", "og:title": "Rust Lang", "author": "team"}],
                "hcard": [{"fn": "Ferris", "role": "mascot"}]
            }
        }))
        .unwrap();
        let item = web_item(raw);
        assert_eq!(item.thumbnail_url.as_deref(), Some("https://t/1.png"));
        assert_eq!(item.thumbnail_width.as_deref(), Some("100"));
        assert_eq!(item.image_url.as_deref(), Some("https://i/1.png"));
        assert_eq!(item.description.as_deref(), Some("plain"));
        assert_eq!(item.site_name.as_deref(), Some("Rust"));
        assert_eq!(item.author.as_deref(), Some("team"));
        assert_eq!(item.metadata.unwrap().title.as_deref(), Some("Rust Lang"));
        assert_eq!(item.hcard.unwrap().full_name.as_deref(), Some("Ferris"));
    }

    #[test]
    fn test_classify_google_errors() {
        let quota = r#"{"error":{"code":429,"message":"Quota exceeded: dailyLimitExceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = classify_google_error(StatusCode::TOO_MANY_REQUESTS, quota);
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.to_string(), "Daily quota for Google search API has been exceeded");

        let denied = r#"{"error":{"code":403,"message":"no","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(classify_google_error(StatusCode::FORBIDDEN, denied).status(), StatusCode::FORBIDDEN);

        let invalid = r#"{"error":{"code":400,"message":"bad","status":"INVALID_ARGUMENT"}}"#;
        let err = classify_google_error(StatusCode::BAD_REQUEST, invalid);
        assert_eq!(err.to_string(), "Invalid request parameters");

        let other = r#"{"error":{"code":404,"message":"Requested entity was not found."}}"#;
        let err = classify_google_error(StatusCode::NOT_FOUND, other);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Requested entity was not found.");

        let garbage = classify_google_error(StatusCode::BAD_GATEWAY, "<html>");
        assert_eq!(garbage.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_search_maps_and_caches() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/customsearch/v1")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "rust".into()),
                Matcher::UrlEncoded("start".into(), "11".into()),
                Matcher::UrlEncoded("num".into(), "10".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "searchInformation": {"searchTime": 0.2, "formattedSearchTime": "0.20",
                        "totalResults": "1234", "formattedTotalResults": "1,234"},
                    "queries": {"nextPage": [{"startIndex": 21}]},
                    "items": [{"title": "Rust", "htmlTitle": "Rust", "link": "https://rust-lang.org",
                        "displayLink": "rust-lang.org", "snippet": "s", "htmlSnippet": "s",
                        "formattedUrl": "https://rust-lang.org", "htmlFormattedUrl": "https://rust-lang.org"}]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let state = state_for(&server);
        let page = search(&state, &query(SearchKind::Web, 2)).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].link(), "https://rust-lang.org");
        assert_eq!(
            page.pagination,
            Pagination {
                current_page: 2,
                total_results: 1234,
                results_per_page: 10,
                has_next_page: true
            }
        );

        // second call is served from the cache
        let again = search(&state, &query(SearchKind::Web, 2)).await.unwrap();
        assert_eq!(again, page);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_image_search_without_items() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/customsearch/v1")
            .match_query(Matcher::UrlEncoded("searchType".into(), "image".into()))
            .with_body(r#"{"searchInformation":{"totalResults":"0"},"queries":{}}"#)
            .create_async()
            .await;

        let state = state_for(&server);
        let page = search(&state, &query(SearchKind::Image, 1)).await.unwrap();
        assert!(page.items.is_empty());
        assert!(!page.pagination.has_next_page);
    }

    #[test]
    fn test_start_index_rejects_unaddressable_pages() {
        assert_eq!(query(SearchKind::Web, 0).start_index(), None);
        assert_eq!(query(SearchKind::Web, u32::MAX).start_index(), None);
    }

    #[tokio::test]
    async fn test_huge_page_is_a_bad_request() {
        let state = Arc::new(AppState::new(Config::default()).unwrap());
        let err = search(&state, &query(SearchKind::Web, u32::MAX)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Invalid request parameters");
    }

    #[tokio::test]
    async fn test_missing_key_is_reported() {
        let state = Arc::new(AppState::new(Config::default()).unwrap());
        let err = search(&state, &query(SearchKind::Web, 1)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotConfigured("GOOGLE_API_KEY")));
    }
}
