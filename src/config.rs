use std::env;
use std::time::Duration;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub google_api_key: Option<String>,
    pub google_cx: Option<String>,
    pub cohere_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub news_api_key: Option<String>,
    pub openweather_api_key: Option<String>,
    pub default_city: String,
    pub search_cache_ttl: Duration,
    pub rate_limit_max: u64,
    pub rate_limit_window: Duration,
    /// Honour `X-Forwarded-For` when keying clients. Only safe behind a
    /// proxy that overwrites the header.
    pub trust_forwarded_for: bool,
    /// Total timeout for proxied API calls. Model streams are not bound by it.
    pub http_timeout: Duration,
    pub upstream: UpstreamUrls,
}

/// Base URLs of every third-party API. Overridable so tests and self-hosted
/// proxies can point elsewhere.
#[derive(Debug, Clone)]
pub struct UpstreamUrls {
    pub google_search: String,
    pub google_complete: String,
    pub youtube: String,
    pub news: String,
    pub openweather: String,
    pub ip_api: String,
    pub cohere: String,
    pub gemini: String,
}

impl Default for UpstreamUrls {
    fn default() -> Self {
        Self {
            google_search: "https://www.googleapis.com/customsearch/v1".to_string(),
            google_complete: "https://www.google.com/complete/search".to_string(),
            youtube: "https://www.googleapis.com/youtube/v3".to_string(),
            news: "https://newsapi.org/v2".to_string(),
            openweather: "https://api.openweathermap.org".to_string(),
            ip_api: "http://ip-api.com/json".to_string(),
            cohere: "https://api.cohere.com/v1".to_string(),
            gemini: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            google_api_key: None,
            google_cx: None,
            cohere_api_key: None,
            gemini_api_key: None,
            news_api_key: None,
            openweather_api_key: None,
            default_city: "jaipur".to_string(),
            search_cache_ttl: Duration::from_secs(60 * 60),
            rate_limit_max: 10,
            rate_limit_window: Duration::from_secs(60),
            trust_forwarded_for: false,
            http_timeout: Duration::from_secs(30),
            upstream: UpstreamUrls::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        let urls = UpstreamUrls::default();

        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            google_api_key: non_empty("GOOGLE_API_KEY"),
            google_cx: non_empty("GOOGLE_CX"),
            cohere_api_key: non_empty("COHERE_API_KEY"),
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            news_api_key: non_empty("NEWS_API_KEY"),
            openweather_api_key: non_empty("OPENWEATHER_API_KEY"),
            default_city: non_empty("DEFAULT_CITY").unwrap_or(defaults.default_city),
            search_cache_ttl: parsed("SEARCH_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.search_cache_ttl),
            rate_limit_max: parsed("RATE_LIMIT_MAX").unwrap_or(defaults.rate_limit_max),
            rate_limit_window: parsed("RATE_LIMIT_WINDOW_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            trust_forwarded_for: parsed("TRUST_FORWARDED_FOR").unwrap_or(defaults.trust_forwarded_for),
            http_timeout: parsed("HTTP_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            upstream: UpstreamUrls {
                google_search: env::var("GOOGLE_SEARCH_URL").unwrap_or(urls.google_search),
                google_complete: env::var("GOOGLE_COMPLETE_URL").unwrap_or(urls.google_complete),
                youtube: env::var("YOUTUBE_API_URL").unwrap_or(urls.youtube),
                news: env::var("NEWS_API_URL").unwrap_or(urls.news),
                openweather: env::var("OPENWEATHER_URL").unwrap_or(urls.openweather),
                ip_api: env::var("IP_API_URL").unwrap_or(urls.ip_api),
                cohere: env::var("COHERE_API_URL").unwrap_or(urls.cohere),
                gemini: env::var("GEMINI_API_URL").unwrap_or(urls.gemini),
            },
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
