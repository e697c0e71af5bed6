use axum::{
    body::Body,
    extract::{rejection::JsonRejection, ConnectInfo, Query, State},
    http::{header, HeaderMap, Request},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures::StreamExt;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::llm::TextStream;
use crate::rate_limit::{client_ip, limit_requests};
use crate::search::SearchQuery;
use crate::types::*;
use crate::{complete, format, news, search, summarize, videos, weather, AppState};

pub fn router(state: Arc<AppState>) -> Router {
    // Model-backed routes share the per-client request budget.
    let limited = Router::new()
        .route("/api/scrape", post(scrape_handler))
        .route("/api/answer", post(answer_handler))
        .route("/api/gemini", post(gemini_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), limit_requests));

    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/api/search", get(search_handler))
        .route("/api/complete", get(complete_handler))
        .route("/api/news", get(news_handler))
        .route("/api/videos", get(videos_handler))
        .route("/api/weather", get(weather_handler))
        .route("/api/weather/city", get(city_handler))
        .route("/api/render", post(render_handler))
        .merge(limited)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                id = %Uuid::new_v4(),
                method = %request.method(),
                uri = %request.uri(),
            )
        }))
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "search-aggregator",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryParam {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsParams {
    q: Option<String>,
    page: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoParams {
    q: Option<String>,
    page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WeatherParams {
    city: Option<String>,
}

fn required(q: Option<String>, message: &str) -> ApiResult<String> {
    q.map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest(message.to_string()))
}

fn page_number(raw: Option<String>) -> ApiResult<u32> {
    match raw.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        None => Ok(1),
        Some(p) => p
            .parse::<u32>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| ApiError::BadRequest("Page must be a positive integer".to_string())),
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::InvalidInput(vec![rejection.body_text()]))
}

fn stream_response(stream: TextStream) -> Response {
    let body = Body::from_stream(stream.map(|part| {
        if let Err(e) = &part {
            error!("Stream failed: {:#}", e);
        }
        part
    }));
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchPage<SearchItem>>> {
    let query = SearchQuery {
        query: required(params.q, "Query parameter is required")?,
        kind: SearchKind::from_param(params.kind.as_deref()),
        page: page_number(params.page)?,
    };
    Ok(Json(search::search(&state, &query).await?))
}

async fn complete_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParam>,
) -> ApiResult<Json<Vec<String>>> {
    let q = required(params.q, "Missing \"q\" query parameter")?;
    Ok(Json(complete::suggestions(&state, &q).await?))
}

async fn news_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NewsParams>,
) -> ApiResult<Json<NewsResponse>> {
    let q = required(params.q, "Query parameter is required")?;
    let page = page_number(params.page)?;
    Ok(Json(news::everything(&state, &q, page).await?))
}

async fn videos_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VideoParams>,
) -> ApiResult<Json<VideoResponse>> {
    let q = required(params.q, "Query parameter is required")?;
    Ok(Json(
        videos::search_videos(&state, &q, params.page_token.as_deref()).await?,
    ))
}

async fn weather_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WeatherParams>,
) -> ApiResult<Json<CurrentWeather>> {
    let city = params
        .city
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| state.config.default_city.clone());
    Ok(Json(weather::current_weather(&state, &city).await?))
}

async fn city_handler(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(params): Query<QueryParam>,
) -> ApiResult<Json<City>> {
    let city = match params.q.filter(|q| !q.trim().is_empty()) {
        Some(q) => weather::geocode(&state, &q).await?,
        None => {
            let ip = client_ip(
                &headers,
                peer.map(|ConnectInfo(addr)| addr),
                state.config.trust_forwarded_for,
            );
            info!("Locating client {}", ip);
            weather::locate_ip(&state, &ip).await?
        }
    };
    Ok(Json(city))
}

async fn scrape_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SummarizeRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let request = json_body(body)?;
    let stream = summarize::summarize_urls(&state, request).await?;
    Ok(stream_response(stream))
}

async fn answer_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AnswerRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let request = json_body(body)?;
    let stream = summarize::answer_query(&state, &request.query).await?;
    Ok(stream_response(stream))
}

async fn gemini_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PromptRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let request = json_body(body)?;
    let stream = summarize::ask(&state, &request.prompt).await?;
    Ok(stream_response(stream))
}

async fn render_handler(body: Result<Json<RenderRequest>, JsonRejection>) -> ApiResult<Json<RenderResponse>> {
    let request = json_body(body)?;
    Ok(Json(RenderResponse {
        html: format::render_markdown(&request.markdown, &request.classes),
    }))
}
