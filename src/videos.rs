use crate::error::{ApiError, ApiResult};
use crate::types::VideoResponse;
use crate::AppState;
use axum::http::StatusCode;
use std::sync::Arc;
use tracing::{error, info};

pub const VIDEOS_PER_PAGE: u32 = 10;

/// One page of YouTube videos; `page_token` comes from the previous page.
pub async fn search_videos(
    state: &Arc<AppState>,
    query: &str,
    page_token: Option<&str>,
) -> ApiResult<VideoResponse> {
    let api_key = state
        .config
        .google_api_key
        .as_deref()
        .ok_or(ApiError::NotConfigured("GOOGLE_API_KEY"))?;

    info!("Searching videos for: {}", query);
    let mut params = vec![
        ("key", api_key.to_string()),
        ("part", "snippet".to_string()),
        ("q", query.to_string()),
        ("type", "video".to_string()),
        ("maxResults", VIDEOS_PER_PAGE.to_string()),
    ];
    if let Some(token) = page_token.filter(|t| !t.is_empty()) {
        params.push(("pageToken", token.to_string()));
    }

    let response = state
        .http_client
        .get(format!("{}/search", state.config.upstream.youtube))
        .query(&params)
        .send()
        .await
        .map_err(|e| {
            error!("YouTube request failed: {}", e);
            ApiError::upstream(StatusCode::INTERNAL_SERVER_ERROR, "An unexpected error occurred")
        })?;

    if !response.status().is_success() {
        return Err(ApiError::from_upstream(response.status()));
    }

    let videos: VideoResponse = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse YouTube response: {}", e))?;
    info!("YouTube returned {} videos", videos.items.len());
    Ok(videos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn video_page(token: Option<&str>) -> String {
        json!({
            "kind": "youtube#searchListResponse",
            "etag": "e",
            "nextPageToken": token,
            "regionCode": "US",
            "pageInfo": {"totalResults": 100, "resultsPerPage": 10},
            "items": [{
                "id": {"kind": "youtube#video", "videoId": "abc"},
                "snippet": {
                    "publishedAt": "2024-01-01T00:00:00Z", "channelId": "c", "title": "Rust in 100s",
                    "description": "d", "channelTitle": "Fireship", "liveBroadcastContent": "none",
                    "publishTime": "2024-01-01T00:00:00Z",
                    "thumbnails": {"default": {"url": "https://i.ytimg.com/1.jpg", "width": 120, "height": 90}}
                }
            }]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_page_token_is_forwarded() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/youtube/v3/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("type".into(), "video".into()),
                Matcher::UrlEncoded("maxResults".into(), "10".into()),
                Matcher::UrlEncoded("pageToken".into(), "CAoQAA".into()),
            ]))
            .with_body(video_page(None))
            .create_async()
            .await;

        let mut config = Config::default();
        config.google_api_key = Some("k".into());
        config.upstream.youtube = format!("{}/youtube/v3", server.url());
        let state = Arc::new(AppState::new(config).unwrap());

        let page = search_videos(&state, "rust", Some("CAoQAA")).await.unwrap();
        assert_eq!(page.items[0].id.video_id, "abc");
        assert!(page.next_page_token.is_none());
        mock.assert_async().await;
    }
}
