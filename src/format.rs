//! Markdown to HTML for streamed summaries.
//!
//! Raw HTML in the source is dropped rather than passed through, and every
//! link opens in a new tab with a `site-link` class.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use pulldown_cmark_escape::{escape_href, escape_html};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

const UNSAFE_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:"];

fn safe_url(url: &str) -> &str {
    let lowered = url.trim().to_ascii_lowercase();
    if UNSAFE_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
        "#"
    } else {
        url
    }
}

// Writing into a String is infallible.
fn href_attr(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    let _ = escape_href(&mut out, url);
    out
}

fn text_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let _ = escape_html(&mut out, value);
    out
}

pub fn render_markdown(markdown: &str, classes: &HashMap<String, String>) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let events = Parser::new_ext(markdown, options).filter_map(|event| match event {
        Event::Html(_) | Event::InlineHtml(_) => None,
        Event::SoftBreak => Some(Event::HardBreak),
        Event::Start(Tag::Link { dest_url, .. }) => Some(Event::InlineHtml(CowStr::from(format!(
            r#"<a href="{}" class="site-link" target="_blank" rel="noopener noreferrer">"#,
            href_attr(safe_url(&dest_url))
        )))),
        Event::End(TagEnd::Link) => Some(Event::InlineHtml(CowStr::Borrowed("</a>"))),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => {
            let dest_url = CowStr::from(safe_url(&dest_url).to_string());
            Some(Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }))
        }
        other => Some(other),
    });

    let mut rendered = String::new();
    html::push_html(&mut rendered, events);
    apply_classes(rendered, classes)
}

/// Adds `class="..."` to every opening tag named in `classes`.
fn apply_classes(html: String, classes: &HashMap<String, String>) -> String {
    // Sorted so output is stable regardless of map order.
    let ordered: BTreeMap<_, _> = classes.iter().collect();
    ordered.into_iter().fold(html, |html, (tag, class)| {
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            return html;
        }
        let Ok(re) = Regex::new(&format!(r"<{}([\s>/])", tag)) else {
            return html;
        };
        let replacement = format!(r#"<{} class="{}"${{1}}"#, tag, text_attr(class));
        re.replace_all(&html, replacement.as_str()).into_owned()
    })
}
