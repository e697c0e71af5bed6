use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }
}

// Search

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Web,
    Image,
}

impl SearchKind {
    /// `image` selects image search; anything else is a plain web search.
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("image") => SearchKind::Image,
            _ => SearchKind::Web,
        }
    }

    pub fn as_param(&self) -> &'static str {
        match self {
            SearchKind::Web => "searchTypeUndefined",
            SearchKind::Image => "image",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchInformation {
    #[serde(default)]
    pub search_time: f64,
    #[serde(default)]
    pub formatted_search_time: String,
    #[serde(default)]
    pub total_results: String,
    #[serde(default)]
    pub formatted_total_results: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_results: u64,
    pub results_per_page: u32,
    pub has_next_page: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage<T> {
    pub search_information: SearchInformation,
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum SearchItem {
    Image(ImageSearchItem),
    Web(WebSearchItem),
}

impl SearchItem {
    pub fn link(&self) -> &str {
        match self {
            SearchItem::Image(item) => &item.link,
            SearchItem::Web(item) => &item.link,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchItem {
    pub title: String,
    pub html_title: String,
    pub link: String,
    pub display_link: String,
    pub snippet: String,
    pub html_snippet: String,
    pub formatted_url: String,
    pub html_formatted_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "site_name", default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<WebsiteMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hcard: Option<Hcard>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub og_image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Hcard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bday: Option<String>,
    #[serde(rename = "fn", default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageSearchItem {
    pub title: String,
    pub html_title: String,
    pub link: String,
    pub display_link: String,
    pub mime: String,
    pub file_format: String,
    pub context_link: String,
    pub image_height: u32,
    pub image_width: u32,
    pub byte_size: u64,
    pub thumbnail_link: String,
    pub thumbnail_height: u32,
    pub thumbnail_width: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

// Google Custom Search API types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleSearchResponse<I> {
    #[serde(default)]
    pub search_information: SearchInformation,
    #[serde(default)]
    pub items: Option<Vec<I>>,
    #[serde(default)]
    pub queries: GoogleQueries,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GoogleQueries {
    #[serde(default)]
    pub next_page: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GoogleWebItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html_title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub display_link: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub html_snippet: String,
    #[serde(default)]
    pub formatted_url: String,
    #[serde(default)]
    pub html_formatted_url: String,
    #[serde(default)]
    pub pagemap: Option<GooglePagemap>,
}

#[derive(Debug, Deserialize, Default)]
pub struct GooglePagemap {
    #[serde(default)]
    pub cse_thumbnail: Vec<GoogleThumbnail>,
    #[serde(default)]
    pub cse_image: Vec<GoogleImageRef>,
    #[serde(default)]
    pub metatags: Vec<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub hcard: Vec<Hcard>,
}

#[derive(Debug, Deserialize, Default)]
pub struct GoogleThumbnail {
    pub src: String,
    #[serde(default)]
    pub width: Option<String>,
    #[serde(default)]
    pub height: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct GoogleImageRef {
    pub src: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GoogleImageItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html_title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub display_link: String,
    #[serde(default)]
    pub mime: String,
    #[serde(default)]
    pub file_format: String,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub image: GoogleImageDetails,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GoogleImageDetails {
    #[serde(default)]
    pub context_link: String,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub byte_size: u64,
    #[serde(default)]
    pub thumbnail_link: String,
    #[serde(default)]
    pub thumbnail_height: u32,
    #[serde(default)]
    pub thumbnail_width: u32,
}

#[derive(Debug, Deserialize)]
pub struct GoogleErrorBody {
    pub error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct GoogleErrorDetail {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

// News

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewsResponse {
    pub status: String,
    pub total_results: u64,
    pub articles: Vec<Article>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub source: ArticleSource,
    #[serde(default)]
    pub author: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
    #[serde(default)]
    pub url_to_image: Option<String>,
    pub published_at: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ArticleSource {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

// Videos

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub etag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_code: Option<String>,
    pub page_info: PageInfo,
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total_results: u64,
    pub results_per_page: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VideoItem {
    pub id: VideoId,
    pub snippet: VideoSnippet,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoId {
    pub kind: String,
    #[serde(default)]
    pub video_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub published_at: String,
    pub channel_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnails: HashMap<String, Thumbnail>,
    pub channel_title: String,
    #[serde(default)]
    pub live_broadcast_content: String,
    #[serde(default)]
    pub publish_time: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

// Weather

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentWeather {
    pub location: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_deg: f64,
    pub clouds: f64,
    pub visibility: f64,
    pub condition: String,
    pub description: String,
    pub icon: String,
    pub sunrise: String,
    pub sunset: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct City {
    pub name: String,
    pub country: String,
    pub state: String,
    pub lat: f64,
    pub lon: f64,
}

// Summaries

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnswerRequest {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RenderRequest {
    pub markdown: String,
    #[serde(default)]
    pub classes: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RenderResponse {
    pub html: String,
}
