//! Accumulates paginated results for "load more" style browsing.

use crate::news::NEWS_PAGE_SIZE;
use crate::types::{Article, NewsResponse, SearchItem, SearchPage, VideoItem, VideoResponse};
use std::collections::HashSet;

/// Selects a page: a 1-based page number or an opaque upstream token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Page(u32),
    Token(String),
}

impl Cursor {
    pub fn page(&self) -> Option<u32> {
        match self {
            Cursor::Page(n) => Some(*n),
            Cursor::Token(_) => None,
        }
    }

    /// Token to send upstream; the first page has none.
    pub fn token(&self) -> Option<&str> {
        match self {
            Cursor::Token(t) if !t.is_empty() => Some(t),
            _ => None,
        }
    }
}

/// A page of results that knows how to reach the page after it.
pub trait Paged {
    type Item;

    fn items(&self) -> &[Self::Item];

    /// Identity used to drop repeats across pages.
    fn key(item: &Self::Item) -> &str;

    /// `fetched_with` is the cursor this page was loaded with and `loaded`
    /// counts the pages in the feed including this one.
    fn next_cursor(&self, fetched_with: &Cursor, loaded: usize) -> Option<Cursor>;

    fn first_cursor() -> Cursor {
        Cursor::Page(1)
    }
}

impl Paged for SearchPage<SearchItem> {
    type Item = SearchItem;

    fn items(&self) -> &[SearchItem] {
        &self.items
    }

    fn key(item: &SearchItem) -> &str {
        item.link()
    }

    fn next_cursor(&self, fetched_with: &Cursor, _loaded: usize) -> Option<Cursor> {
        let current = fetched_with.page()?;
        let next = current.checked_add(1)?;
        (!self.items.is_empty()).then_some(Cursor::Page(next))
    }
}

impl Paged for NewsResponse {
    type Item = Article;

    fn items(&self) -> &[Article] {
        &self.articles
    }

    fn key(item: &Article) -> &str {
        &item.url
    }

    fn next_cursor(&self, fetched_with: &Cursor, loaded: usize) -> Option<Cursor> {
        let current = fetched_with.page()?;
        let total_pages = self.total_results.div_ceil(u64::from(NEWS_PAGE_SIZE));
        let next = current.checked_add(1)?;
        ((loaded as u64) < total_pages).then_some(Cursor::Page(next))
    }
}

impl Paged for VideoResponse {
    type Item = VideoItem;

    fn items(&self) -> &[VideoItem] {
        &self.items
    }

    fn key(item: &VideoItem) -> &str {
        &item.id.video_id
    }

    fn next_cursor(&self, _fetched_with: &Cursor, _loaded: usize) -> Option<Cursor> {
        self.next_page_token
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(|t| Cursor::Token(t.clone()))
    }

    fn first_cursor() -> Cursor {
        Cursor::Token(String::new())
    }
}

/// Every page loaded so far for one query, with the cursor each came from.
#[derive(Debug, Clone)]
pub struct Feed<P> {
    pages: Vec<(Cursor, P)>,
}

impl<P> Default for Feed<P> {
    fn default() -> Self {
        Self { pages: Vec::new() }
    }
}

impl<P: Paged> Feed<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cursor: Cursor, page: P) {
        self.pages.push((cursor, page));
    }

    /// Cursor of the page to load next, `None` once exhausted.
    pub fn next_cursor(&self) -> Option<Cursor> {
        match self.pages.last() {
            None => Some(P::first_cursor()),
            Some((cursor, page)) => page.next_cursor(cursor, self.pages.len()),
        }
    }

    pub fn has_next(&self) -> bool {
        self.next_cursor().is_some()
    }

    /// All items in load order, first occurrence of each key kept.
    pub fn items(&self) -> Vec<&P::Item> {
        let mut seen = HashSet::new();
        self.pages
            .iter()
            .flat_map(|(_, page)| page.items())
            .filter(|item| seen.insert(P::key(*item)))
            .collect()
    }

    pub fn pages(&self) -> impl Iterator<Item = &P> {
        self.pages.iter().map(|(_, page)| page)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn reset(&mut self) {
        self.pages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;
    use serde_json::json;

    fn search_page(links: &[&str]) -> SearchPage<SearchItem> {
        let items: Vec<_> = links
            .iter()
            .map(|link| {
                json!({
                    "title": link, "htmlTitle": link, "link": link, "displayLink": link,
                    "snippet": "", "htmlSnippet": "", "formattedUrl": link, "htmlFormattedUrl": link
                })
            })
            .collect();
        serde_json::from_value(json!({
            "searchInformation": {"searchTime": 0.1, "formattedSearchTime": "0.10",
                                  "totalResults": "100", "formattedTotalResults": "100"},
            "items": items,
            "pagination": {"currentPage": 1, "totalResults": 100, "resultsPerPage": 10, "hasNextPage": true}
        }))
        .unwrap()
    }

    fn news_page(total: u64, urls: &[&str]) -> NewsResponse {
        let articles: Vec<_> = urls
            .iter()
            .map(|url| {
                json!({"source": {"id": null, "name": "Example"}, "title": url, "url": url,
                       "publishedAt": "2024-01-01T00:00:00Z"})
            })
            .collect();
        serde_json::from_value(json!({"status": "ok", "totalResults": total, "articles": articles})).unwrap()
    }

    fn video_page(token: Option<&str>, ids: &[&str]) -> VideoResponse {
        let items: Vec<_> = ids
            .iter()
            .map(|id| {
                json!({
                    "id": {"kind": "youtube#video", "videoId": id},
                    "snippet": {"publishedAt": "", "channelId": "", "title": id, "description": "",
                                "channelTitle": "", "liveBroadcastContent": "none", "publishTime": "",
                                "thumbnails": {}}
                })
            })
            .collect();
        serde_json::from_value(json!({
            "nextPageToken": token,
            "pageInfo": {"totalResults": 30, "resultsPerPage": 10},
            "items": items
        }))
        .unwrap()
    }

    #[test]
    fn test_search_continues_until_an_empty_page() {
        let mut feed: Feed<SearchPage<SearchItem>> = Feed::new();
        assert_eq!(feed.next_cursor(), Some(Cursor::Page(1)));

        feed.push(Cursor::Page(1), search_page(&["a", "b"]));
        assert_eq!(feed.next_cursor(), Some(Cursor::Page(2)));

        feed.push(Cursor::Page(2), search_page(&[]));
        assert!(!feed.has_next());
    }

    #[test]
    fn test_news_stops_at_total_pages() {
        let mut feed: Feed<NewsResponse> = Feed::new();
        feed.push(Cursor::Page(1), news_page(15, &["u1"]));
        assert_eq!(feed.next_cursor(), Some(Cursor::Page(2)));
        feed.push(Cursor::Page(2), news_page(15, &["u2"]));
        assert_eq!(feed.next_cursor(), None);
    }

    #[test]
    fn test_videos_follow_tokens() {
        let mut feed: Feed<VideoResponse> = Feed::new();
        assert_eq!(feed.next_cursor().unwrap().token(), None);

        feed.push(Cursor::Token(String::new()), video_page(Some("CAoQAA"), &["v1"]));
        assert_eq!(feed.next_cursor(), Some(Cursor::Token("CAoQAA".into())));

        feed.push(Cursor::Token("CAoQAA".into()), video_page(None, &["v2"]));
        assert!(!feed.has_next());
    }

    #[test]
    fn test_items_are_deduplicated_in_order() {
        let mut feed: Feed<NewsResponse> = Feed::new();
        feed.push(Cursor::Page(1), news_page(30, &["u1", "u2"]));
        feed.push(Cursor::Page(2), news_page(30, &["u2", "u3"]));
        let urls: Vec<_> = feed.items().into_iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["u1", "u2", "u3"]);
    }

    #[test]
    fn test_reset_starts_over() {
        let mut feed: Feed<SearchPage<SearchItem>> = Feed::new();
        feed.push(Cursor::Page(1), search_page(&["a"]));
        feed.reset();
        assert!(feed.is_empty());
        assert_eq!(feed.next_cursor(), Some(Cursor::Page(1)));
    }
}
