use moka::future::Cache;
use rand::Rng;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// User agents for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/109.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 15_6_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.6.1 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (iPad; CPU OS 15_6_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.6.1 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36 Edg/114.0.1823.67",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:102.0) Gecko/20100101 Firefox/102.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:102.0) Gecko/20100101 Firefox/102.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_7_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.2 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (iPad; CPU OS 14_7_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.2 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 10; Pixel 4) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36 OPR/90.0.4480.84",
];

/// Subtrees that never carry article text.
const BOILERPLATE: &str = "script, style, nav, header, footer, iframe, [role=banner], [role=navigation], .ads, #ads, .advertisement";

/// Candidates for the main content region, first match in document order wins.
const MAIN_CONTENT: &str = "main, article, #content, .content, [role=main]";

/// Pages with less text than this are returned but not cached.
pub const MIN_CACHEABLE_CHARS: usize = 100;

const SCRAPE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Invalid URL '{url}': must be an absolute http(s) URL")]
    InvalidUrl { url: String },

    #[error("HTTP error! status: {status} ({url})")]
    Status { status: u16, url: String },

    #[error("Timeout while scraping {url}")]
    Timeout { url: String },

    #[error("Error scraping {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Fetches pages and reduces them to their readable text.
#[derive(Clone)]
pub struct Scraper {
    client: Client,
    content_cache: Cache<String, String>,
}

impl Scraper {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(SCRAPE_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            client,
            content_cache: Cache::builder()
                .max_capacity(100)
                .time_to_live(Duration::from_secs(60 * 60))
                .build(),
        })
    }

    /// Get a random User-Agent string
    fn random_user_agent(&self) -> &'static str {
        let mut rng = rand::thread_rng();
        USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
    }

    pub async fn scrape_website(&self, url: &str) -> Result<String, ScrapeError> {
        if let Some(cached) = self.content_cache.get(url).await {
            debug!("content cache hit for {}", url);
            return Ok(cached);
        }

        let parsed = Url::parse(url).map_err(|_| ScrapeError::InvalidUrl { url: url.to_string() })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ScrapeError::InvalidUrl { url: url.to_string() });
        }

        info!("Scraping URL: {}", url);
        let request_error = |e: reqwest::Error| {
            if e.is_timeout() {
                ScrapeError::Timeout { url: url.to_string() }
            } else {
                ScrapeError::Request {
                    url: url.to_string(),
                    source: e,
                }
            }
        };

        let response = self
            .client
            .get(parsed)
            .header("User-Agent", self.random_user_agent())
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.5")
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            return Err(ScrapeError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let html = response.text().await.map_err(request_error)?;
        let content = extract_main_text(&html);

        if content.chars().count() < MIN_CACHEABLE_CHARS {
            warn!("Very little content scraped from {} ({} chars)", url, content.len());
            return Ok(content);
        }

        info!("Scraped {} chars from {}", content.len(), url);
        self.content_cache.insert(url.to_string(), content.clone()).await;
        Ok(content)
    }
}

fn selector(cell: &'static OnceLock<Selector>, css: &'static str) -> &'static Selector {
    cell.get_or_init(|| Selector::parse(css).expect("static selector must parse"))
}

fn boilerplate() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    selector(&CELL, BOILERPLATE)
}

fn main_content() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    selector(&CELL, MAIN_CONTENT)
}

fn body() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    selector(&CELL, "body")
}

/// Readable text of an HTML document: boilerplate removed, main content
/// preferred over the whole body, whitespace collapsed.
pub fn extract_main_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let root = document
        .select(main_content())
        .find(|element| !inside_boilerplate(element))
        .or_else(|| document.select(body()).next())
        .unwrap_or_else(|| document.root_element());

    let mut parts = Vec::new();
    collect_text(&root, &mut parts);
    clean_text(&parts.join(" "))
}

/// True when the element or any ancestor is boilerplate.
fn inside_boilerplate(element: &ElementRef) -> bool {
    boilerplate().matches(element)
        || element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| boilerplate().matches(&ancestor))
}

/// Recursively extract text, skipping boilerplate subtrees
fn collect_text(element: &ElementRef, parts: &mut Vec<String>) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if boilerplate().matches(&child_element) {
                continue;
            }
            collect_text(&child_element, parts);
        } else if let Some(text) = child.value().as_text() {
            parts.push(text.text.to_string());
        }
    }
}

fn clean_text(text: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let re = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static regex must parse"));
    re.replace_all(text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    const ARTICLE: &str = r#"<html><head><title>t</title><style>.x{}</style></head>
        <body>
          <header>Site header</header>
          <nav>Home | About</nav>
          <div class="ads">Buy now</div>
          <article><h1>Ferris</h1><p>Ferris   is the
             unofficial mascot.</p><script>track()</script></article>
          <footer>Copyright</footer>
        </body></html>"#;

    #[test]
    fn test_prefers_main_content() {
        let text = extract_main_text(ARTICLE);
        assert_eq!(text, "Ferris Ferris is the unofficial mascot.");
    }

    #[test]
    fn test_falls_back_to_body_without_boilerplate() {
        let html = "<html><body><nav>menu</nav><p>Plain   page</p><div id=\"ads\">ad</div></body></html>";
        assert_eq!(extract_main_text(html), "Plain page");
    }

    #[test]
    fn test_skips_main_candidates_inside_boilerplate() {
        let html = r#"<body><header><div class="content">logo</div></header>
            <div role="main">Real text</div></body>"#;
        assert_eq!(extract_main_text(html), "Real text");
    }

    #[test]
    fn test_skips_main_candidates_that_are_boilerplate() {
        let html = r#"<body><article class="ads">Sponsored offer</article>
            <article>Real story</article></body>"#;
        assert_eq!(extract_main_text(html), "Real story");
    }

    #[test]
    fn test_user_agents_cover_desktop_and_mobile() {
        assert_eq!(USER_AGENTS.len(), 15);
        assert!(USER_AGENTS.iter().any(|ua| ua.contains("iPhone")));
        assert!(USER_AGENTS.iter().any(|ua| ua.contains("iPad")));
        let scraper = Scraper::new().unwrap();
        assert!(USER_AGENTS.contains(&scraper.random_user_agent()));
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  This   is    \n\n\n   some    text   \n\n  "), "This is some text");
    }

    #[tokio::test]
    async fn test_rejects_non_http_urls() {
        let scraper = Scraper::new().unwrap();
        let err = scraper.scrape_website("ftp://example.com/file").await.unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_maps_http_errors() {
        let mut server = Server::new_async().await;
        let _m = server.mock("GET", "/missing").with_status(404).create_async().await;

        let scraper = Scraper::new().unwrap();
        let err = scraper
            .scrape_website(&format!("{}/missing", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_caches_only_substantial_pages() {
        let mut server = Server::new_async().await;
        let long_body = format!("<main>{}</main>", "Rust is fast. ".repeat(20));
        let long = server
            .mock("GET", "/long")
            .with_body(long_body)
            .expect(1)
            .create_async()
            .await;
        let short = server
            .mock("GET", "/short")
            .with_body("<main>tiny</main>")
            .expect(2)
            .create_async()
            .await;

        let scraper = Scraper::new().unwrap();
        let long_url = format!("{}/long", server.url());
        let short_url = format!("{}/short", server.url());

        let first = scraper.scrape_website(&long_url).await.unwrap();
        let second = scraper.scrape_website(&long_url).await.unwrap();
        assert_eq!(first, second);

        assert_eq!(scraper.scrape_website(&short_url).await.unwrap(), "tiny");
        assert_eq!(scraper.scrape_website(&short_url).await.unwrap(), "tiny");

        long.assert_async().await;
        short.assert_async().await;
    }
}
