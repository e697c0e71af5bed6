//! Sentence-aligned text chunking for prompt context.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const CHUNK_SIZE: usize = 1000;
pub const CHUNK_OVERLAP: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub content: String,
}

fn sentence_end() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+").expect("static regex must parse"))
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex must parse"))
}

/// Splits `content` into chunks of at most [`CHUNK_SIZE`] chars, each new
/// chunk starting with the last [`CHUNK_OVERLAP`] chars of the previous one.
pub fn split_content(content: &str) -> Vec<Chunk> {
    split_with(content, CHUNK_SIZE, CHUNK_OVERLAP)
}

pub fn split_with(content: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let normalized = whitespace().replace_all(content, " ");
    let normalized = normalized.trim();

    let mut chunks = Vec::new();
    let mut current = String::new();
    // Char count of `current`, kept alongside to avoid rescanning.
    let mut current_len = 0usize;
    let mut index = 0usize;

    for sentence in sentence_end().split(normalized) {
        let sentence_len = sentence.chars().count();

        if current_len + sentence_len + 1 > chunk_size {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                chunks.push(Chunk {
                    index,
                    content: trimmed.to_string(),
                });
                index += 1;
            }

            let tail = char_tail(&current, overlap);
            current = if tail.is_empty() {
                sentence.to_string()
            } else {
                format!("{} {}", tail, sentence)
            };
            current_len = current.chars().count();
        } else {
            if !current.is_empty() {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(sentence);
            current_len += sentence_len;
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(Chunk {
            index,
            content: trimmed.to_string(),
        });
    }

    chunks
}

/// Last `n` chars of `s`, cut on a char boundary.
fn char_tail(s: &str, n: usize) -> &str {
    let len = s.chars().count();
    if len <= n {
        return s;
    }
    let start = s
        .char_indices()
        .nth(len - n)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &s[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = split_content("Rust is fast.  It is also   safe!");
        assert_eq!(
            chunks,
            vec![Chunk {
                index: 0,
                content: "Rust is fast It is also safe!".to_string()
            }]
        );
    }

    #[test]
    fn test_empty_input_has_no_chunks() {
        assert!(split_content("   \n\t ").is_empty());
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let sentence = "a".repeat(90);
        let text = vec![sentence.as_str(); 40].join(". ");
        let chunks = split_content(&text);

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert!(chunk.content.chars().count() <= CHUNK_SIZE);
        }
        for pair in chunks.windows(2) {
            let tail = char_tail(&pair[0].content, CHUNK_OVERLAP);
            assert!(pair[1].content.starts_with(tail.trim()));
        }
    }

    #[test]
    fn test_oversized_first_sentence_is_not_dropped() {
        let long = "b".repeat(30);
        let chunks = split_with(&format!("{}. short", long), 20, 5);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].content, long);
        assert!(chunks.iter().all(|c| !c.content.is_empty()));
        assert_eq!(chunks.last().map(|c| c.content.as_str()), Some("bbbbb short"));
    }

    #[test]
    fn test_overlap_is_utf8_safe() {
        let sentence = "日本語のテキスト".repeat(10);
        let text = vec![sentence.as_str(); 30].join("! ");
        let chunks = split_content(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.content.chars().count() <= CHUNK_SIZE));
    }

    #[test]
    fn test_char_tail() {
        assert_eq!(char_tail("hello", 10), "hello");
        assert_eq!(char_tail("hello", 2), "lo");
        assert_eq!(char_tail("héllo", 4), "éllo");
    }
}
