//! Streaming clients for the hosted language models.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use std::pin::Pin;
use tracing::{debug, info};

pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A hosted model that answers a single prompt with a stream of text deltas.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    /// Fails before streaming if the provider rejects the request.
    async fn stream(&self, prompt: &str) -> Result<TextStream>;
}

/// Re-assembles newline-terminated lines from arbitrary byte chunks.
/// Bytes are buffered until a full line arrives, so multi-byte characters
/// split across chunks decode correctly.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            lines.push(text.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Whatever is left after the body ends without a final newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.buf).trim().to_string();
        self.buf.clear();
        (!rest.is_empty()).then_some(rest)
    }
}

enum LineEvent {
    Text(String),
    Skip,
    Done,
    Fail(anyhow::Error),
}

fn line_stream<F>(response: reqwest::Response, mut parse: F) -> TextStream
where
    F: FnMut(&str) -> LineEvent + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut bytes = response.bytes_stream();
        let mut lines = LineBuffer::default();
        let mut done = false;

        while !done {
            let batch: Vec<String> = match bytes.next().await {
                Some(Ok(chunk)) => lines.push(&chunk),
                Some(Err(e)) => {
                    yield Err(anyhow!("stream interrupted: {}", e));
                    break;
                }
                None => {
                    done = true;
                    lines.finish().into_iter().collect()
                }
            };
            for line in batch {
                match parse(&line) {
                    LineEvent::Text(text) => yield Ok(text),
                    LineEvent::Skip => {}
                    LineEvent::Done => {
                        done = true;
                        break;
                    }
                    LineEvent::Fail(e) => {
                        yield Err(e);
                        done = true;
                        break;
                    }
                }
            }
        }
    };
    Box::pin(stream)
}

async fn ensure_success(response: reqwest::Response, provider: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    bail!("{} API error ({}): {}", provider, status, body)
}

/// Cohere chat endpoint streaming newline-delimited JSON events.
pub struct CohereModel {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl CohereModel {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: "command-nightly".to_string(),
            temperature: 0.3,
        }
    }
}

fn parse_cohere_line(line: &str) -> LineEvent {
    if line.trim().is_empty() {
        return LineEvent::Skip;
    }
    let Ok(event) = serde_json::from_str::<Value>(line) else {
        debug!("ignoring non-JSON Cohere line");
        return LineEvent::Skip;
    };
    match event["event_type"].as_str().unwrap_or("") {
        "text-generation" => match event["text"].as_str() {
            Some(text) if !text.is_empty() => LineEvent::Text(text.to_string()),
            _ => LineEvent::Skip,
        },
        "stream-end" => {
            if event["finish_reason"].as_str() == Some("ERROR") {
                LineEvent::Fail(anyhow!("Cohere stream ended with an error"))
            } else {
                LineEvent::Done
            }
        }
        _ => LineEvent::Skip,
    }
}

#[async_trait]
impl ChatModel for CohereModel {
    fn name(&self) -> &str {
        "cohere"
    }

    async fn stream(&self, prompt: &str) -> Result<TextStream> {
        info!("Streaming from Cohere model {}", self.model);
        let body = json!({
            "message": prompt,
            "model": self.model,
            "temperature": self.temperature,
            "stream": true,
        });
        let response = self
            .client
            .post(format!("{}/chat", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response, "Cohere").await?;
        Ok(line_stream(response, parse_cohere_line))
    }
}

/// Gemini `streamGenerateContent` in SSE mode.
pub struct GeminiModel {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiModel {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: "gemini-1.5-flash".to_string(),
        }
    }
}

fn parse_gemini_line(line: &str) -> LineEvent {
    let Some(data) = line.strip_prefix("data:") else {
        return LineEvent::Skip;
    };
    let data = data.trim();
    if data.is_empty() {
        return LineEvent::Skip;
    }
    if data == "[DONE]" {
        return LineEvent::Done;
    }
    let Ok(event) = serde_json::from_str::<Value>(data) else {
        return LineEvent::Skip;
    };
    if let Some(message) = event["error"]["message"].as_str() {
        return LineEvent::Fail(anyhow!("Gemini error: {}", message));
    }
    let text: String = event["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();
    if text.is_empty() {
        LineEvent::Skip
    } else {
        LineEvent::Text(text)
    }
}

#[async_trait]
impl ChatModel for GeminiModel {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn stream(&self, prompt: &str) -> Result<TextStream> {
        info!("Streaming from Gemini model {}", self.model);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        let response = self
            .client
            .post(format!(
                "{}/models/{}:streamGenerateContent",
                self.base_url, self.model
            ))
            .query(&[("alt", "sse"), ("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response, "Gemini").await?;
        Ok(line_stream(response, parse_gemini_line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    async fn collect(stream: TextStream) -> Vec<Result<String>> {
        stream.collect().await
    }

    #[test]
    fn test_line_buffer_joins_split_chunks() {
        let mut buffer = LineBuffer::default();
        let bytes = "héllo\nwor".as_bytes();
        // split inside the two-byte 'é'
        assert!(buffer.push(&bytes[..2]).is_empty());
        assert_eq!(buffer.push(&bytes[2..]), vec!["héllo".to_string()]);
        assert_eq!(buffer.push(b"ld\r\n"), vec!["world".to_string()]);
        assert_eq!(buffer.push(b"tail"), Vec::<String>::new());
        assert_eq!(buffer.finish().as_deref(), Some("tail"));
        assert!(buffer.finish().is_none());
    }

    #[tokio::test]
    async fn test_cohere_streams_text_generation_events() {
        let mut server = Server::new_async().await;
        let body = [
            r#"{"is_finished":false,"event_type":"stream-start","generation_id":"g"}"#,
            r##"{"is_finished":false,"event_type":"text-generation","text":"# Ferris"}"##,
            r#"{"is_finished":false,"event_type":"text-generation","text":" the crab"}"#,
            r#"{"is_finished":true,"event_type":"stream-end","finish_reason":"COMPLETE"}"#,
            r#"{"is_finished":false,"event_type":"text-generation","text":"ignored"}"#,
        ]
        .join("\n");
        let mock = server
            .mock("POST", "/chat")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(json!({"stream": true, "model": "command-nightly"})))
            .with_body(body)
            .create_async()
            .await;

        let model = CohereModel::new(Client::new(), server.url(), "test-key");
        let chunks = collect(model.stream("who is ferris").await.unwrap()).await;
        let text: String = chunks.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(text, "# Ferris the crab");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_cohere_rejection_fails_before_streaming() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/chat")
            .with_status(401)
            .with_body(r#"{"message":"invalid api token"}"#)
            .create_async()
            .await;

        let model = CohereModel::new(Client::new(), server.url(), "bad");
        let err = model.stream("hi").await.err().expect("request should fail");
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_gemini_streams_sse_parts() {
        let mut server = Server::new_async().await;
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hello\"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\", \"},{\"text\":\"world\"}]}}]}\r\n\r\n",
        );
        let _m = server
            .mock("POST", "/models/gemini-1.5-flash:streamGenerateContent")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("alt".into(), "sse".into()),
                Matcher::UrlEncoded("key".into(), "k".into()),
            ]))
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let model = GeminiModel::new(Client::new(), server.url(), "k");
        let chunks = collect(model.stream("hi").await.unwrap()).await;
        let text: Vec<String> = chunks.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(text, vec!["Hello".to_string(), ", world".to_string()]);
    }

    #[tokio::test]
    async fn test_gemini_error_event_fails_stream() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/models/gemini-1.5-flash:streamGenerateContent")
            .match_query(Matcher::Any)
            .with_body("data: {\"error\":{\"code\":500,\"message\":\"overloaded\"}}\n\n")
            .create_async()
            .await;

        let model = GeminiModel::new(Client::new(), server.url(), "k");
        let chunks = collect(model.stream("hi").await.unwrap()).await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].as_ref().unwrap_err().to_string().contains("overloaded"));
    }
}
