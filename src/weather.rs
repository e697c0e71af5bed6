use crate::error::{ApiError, ApiResult};
use crate::types::{City, CurrentWeather};
use crate::AppState;
use anyhow::anyhow;
use backoff::backoff::Constant;
use backoff::future::retry;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How often a failed weather lookup is repeated before giving up.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
    name: String,
    #[serde(default)]
    timezone: i32,
    #[serde(default)]
    visibility: f64,
    sys: OwmSys,
    main: OwmMain,
    #[serde(default)]
    wind: OwmWind,
    #[serde(default)]
    clouds: OwmClouds,
    #[serde(default)]
    weather: Vec<OwmCondition>,
}

#[derive(Debug, Deserialize)]
struct OwmSys {
    #[serde(default)]
    country: String,
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize, Default)]
struct OwmWind {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: f64,
}

#[derive(Debug, Deserialize, Default)]
struct OwmClouds {
    #[serde(default)]
    all: f64,
}

#[derive(Debug, Deserialize, Default)]
struct OwmCondition {
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct GeoHit {
    name: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    state: Option<String>,
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpLocation {
    status: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    region_name: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
}

/// Wall-clock time at the city, `HH:MM:SS`.
pub fn local_time(unix_secs: i64, utc_offset_secs: i32) -> String {
    let offset = FixedOffset::east_opt(utc_offset_secs)
        .unwrap_or_else(|| Utc.fix());
    DateTime::from_timestamp(unix_secs, 0)
        .map(|t| t.with_timezone(&offset).format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

fn into_current(raw: OwmResponse) -> CurrentWeather {
    let condition = raw.weather.into_iter().next().unwrap_or_default();
    CurrentWeather {
        location: format!("{}, {}", raw.name, raw.sys.country),
        temperature: raw.main.temp,
        feels_like: raw.main.feels_like,
        temp_min: raw.main.temp_min,
        temp_max: raw.main.temp_max,
        humidity: raw.main.humidity,
        pressure: raw.main.pressure,
        wind_speed: raw.wind.speed,
        wind_deg: raw.wind.deg,
        clouds: raw.clouds.all,
        visibility: raw.visibility,
        condition: condition.main,
        description: condition.description,
        icon: condition.icon,
        sunrise: local_time(raw.sys.sunrise, raw.timezone),
        sunset: local_time(raw.sys.sunset, raw.timezone),
    }
}

fn api_key(state: &AppState) -> ApiResult<&str> {
    state
        .config
        .openweather_api_key
        .as_deref()
        .ok_or(ApiError::NotConfigured("OPENWEATHER_API_KEY"))
}

pub async fn current_weather(state: &Arc<AppState>, city: &str) -> ApiResult<CurrentWeather> {
    current_weather_with(state, city, RetryPolicy::default()).await
}

pub async fn current_weather_with(
    state: &Arc<AppState>,
    city: &str,
    policy: RetryPolicy,
) -> ApiResult<CurrentWeather> {
    let key = api_key(state)?.to_string();
    if city.trim().is_empty() {
        return Err(ApiError::BadRequest("City data is not available".to_string()));
    }
    info!("Fetching weather for: {}", city);

    let client = state.http_client.clone();
    let url = format!("{}/data/2.5/weather", state.config.upstream.openweather);
    let attempts = AtomicU32::new(0);
    let max_attempts = policy.retries + 1;

    let raw: OwmResponse = retry(Constant::new(policy.delay), || {
        let client = client.clone();
        let url = url.clone();
        let key = key.clone();
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            let give_up = |err: ApiError| {
                if attempt >= max_attempts {
                    backoff::Error::permanent(err)
                } else {
                    warn!("Weather attempt {} failed: {}", attempt, err);
                    backoff::Error::transient(err)
                }
            };
            let resp = client
                .get(&url)
                .query(&[("q", city), ("units", "metric"), ("appid", key.as_str())])
                .send()
                .await
                .map_err(|e| give_up(ApiError::Internal(anyhow!("Failed to fetch weather data: {}", e))))?;
            let status = resp.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(backoff::Error::permanent(ApiError::NotFound("City not found".to_string())));
            }
            if status.is_client_error() {
                return Err(backoff::Error::permanent(ApiError::from_upstream(status)));
            }
            if !status.is_success() {
                return Err(give_up(ApiError::from_upstream(status)));
            }
            resp.json::<OwmResponse>()
                .await
                .map_err(|e| backoff::Error::permanent(ApiError::Internal(anyhow!("Failed to parse weather data: {}", e))))
        }
    })
    .await?;

    Ok(into_current(raw))
}

/// Resolves a city name to coordinates.
pub async fn geocode(state: &Arc<AppState>, query: &str) -> ApiResult<City> {
    let key = api_key(state)?;
    let response = state
        .http_client
        .get(format!("{}/geo/1.0/direct", state.config.upstream.openweather))
        .query(&[("q", query), ("limit", "1"), ("appid", key)])
        .send()
        .await
        .map_err(|e| anyhow!("Failed to fetch city data: {}", e))?;
    if !response.status().is_success() {
        return Err(ApiError::from_upstream(response.status()));
    }
    let hits: Vec<GeoHit> = response
        .json()
        .await
        .map_err(|e| anyhow!("Failed to parse city data: {}", e))?;
    let hit = hits
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound("City not found".to_string()))?;
    Ok(City {
        name: hit.name,
        country: hit.country,
        state: hit.state.unwrap_or_default(),
        lat: hit.lat,
        lon: hit.lon,
    })
}

/// Approximate city of a client address.
pub async fn locate_ip(state: &Arc<AppState>, ip: &str) -> ApiResult<City> {
    let response = state
        .http_client
        .get(format!("{}/{}", state.config.upstream.ip_api, ip))
        .send()
        .await
        .map_err(|e| anyhow!("Failed to fetch location data: {}", e))?;
    if !response.status().is_success() {
        return Err(ApiError::from_upstream(response.status()));
    }
    let location: IpLocation = response
        .json()
        .await
        .map_err(|e| anyhow!("Failed to parse location data: {}", e))?;
    if location.status != "success" {
        return Err(ApiError::NotFound("Location not found".to_string()));
    }
    Ok(City {
        name: location.city,
        country: location.country,
        state: location.region_name,
        lat: location.lat,
        lon: location.lon,
    })
}
