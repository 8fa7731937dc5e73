//! Generation gateway: OpenAI Responses API client with SSE streaming.
//!
//! Streaming events are delivered through a callback; the full response text
//! is also accumulated and returned so callers that only care about the
//! terminal result can ignore the fragments entirely.

use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Default model for production use.
pub const DEFAULT_MODEL: &str = "gpt-5";

/// Smaller, faster model for testing.
pub const MODEL_MINI: &str = "gpt-5-mini";

/// Smallest model, cheapest for testing.
pub const MODEL_NANO: &str = "gpt-5-nano";

/// Default max output tokens. Reasoning models spend tokens on both reasoning
/// and output, so the budget must cover both.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// System prompt for the educational storytelling assistant, aimed at
/// children between the ages of 2 and 8.
pub fn system_prompt() -> &'static str {
    "You are a lovely and warm teacher who is able to expertly weave education \
     into a story. You are also able to answer questions about the story. You \
     primarily focus on children between the ages of 2 and 8 and will modify \
     your tone and language to be appropriate for that age group. You allow \
     for tangents in the story to help the child learn and grow, but \
     ultimately try and steer them back to the main goal of the story. If the \
     child asks completely unrelated questions you will answer as best you \
     can, while trying to steer it back on topic. Be open and friendly, but \
     also firm when needed."
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API error (status {status}): {body}")]
    Upstream { status: u16, body: String },
}

/// Streaming event from the API.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Text content delta
    TextDelta(String),
    /// Stream completed
    Done,
}

#[derive(Deserialize)]
struct ResponsesResult {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<ContentItem>,
}

#[derive(Deserialize)]
struct ContentItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct SseEvent {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    delta: String,
}

/// OpenAI Responses API client.
#[derive(Clone)]
pub struct AiClient {
    api_key: String,
    org_id: Option<String>,
    model: String,
    max_tokens: u32,
    base_url: String,
    http: Client,
}

impl AiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            org_id: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    /// Override the API endpoint. Used by tests to point at a local server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Input array for the Responses API: system prompt, then the history as
    /// alternating user/assistant turns, then the current message.
    fn build_input(&self, message: &str, history: &[String]) -> serde_json::Value {
        let mut messages = vec![json!({
            "role": "system",
            "content": system_prompt(),
        })];

        for (i, msg) in history.iter().enumerate() {
            let role = if i % 2 == 0 { "user" } else { "assistant" };
            messages.push(json!({ "role": role, "content": msg }));
        }

        messages.push(json!({ "role": "user", "content": message }));
        serde_json::Value::Array(messages)
    }

    fn request(&self, stream: bool, message: &str, history: &[String]) -> reqwest::RequestBuilder {
        let body = json!({
            "model": self.model,
            "input": self.build_input(message, history),
            "stream": stream,
            "max_output_tokens": self.max_tokens,
        });

        let mut req = self
            .http
            .post(format!("{}/v1/responses", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");

        if let Some(org_id) = &self.org_id {
            req = req.header("OpenAI-Organization", org_id);
        }

        req.json(&body)
    }

    /// Send a message and return the complete response text.
    pub async fn generate(&self, message: &str, history: &[String]) -> Result<String, AiError> {
        tracing::debug!(model = %self.model, history_len = history.len(), "sending request");

        let response = self.request(false, message, history).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Upstream { status, body });
        }

        let result: ResponsesResult = response.json().await?;

        for output in result.output {
            if output.kind == "message" {
                for content in output.content {
                    if content.kind == "output_text" || content.kind == "text" {
                        return Ok(content.text);
                    }
                }
            }
        }

        tracing::warn!("empty response from OpenAI");
        Ok(String::new())
    }

    /// Send a message and stream the response. Each text fragment is passed
    /// to `on_event` as it arrives; the accumulated full text is returned
    /// when the stream terminates.
    pub async fn generate_stream(
        &self,
        message: &str,
        history: &[String],
        on_event: impl Fn(StreamEvent) + Send + 'static,
    ) -> Result<String, AiError> {
        tracing::debug!(model = %self.model, history_len = history.len(), "starting streaming request");

        let response = self
            .request(true, message, history)
            .header("Accept", "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Upstream { status, body });
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut full_text = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Process complete SSE events
            while let Some(pos) = buffer.find("\n\n") {
                let event = buffer[..pos].to_string();
                buffer = buffer[pos + 2..].to_string();

                for line in event.lines() {
                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };

                    if data == "[DONE]" {
                        tracing::debug!(chars = full_text.len(), "stream completed");
                        on_event(StreamEvent::Done);
                        return Ok(full_text);
                    }

                    let Ok(parsed) = serde_json::from_str::<SseEvent>(data) else {
                        tracing::debug!(data, "failed to parse stream event");
                        continue;
                    };

                    if parsed.kind == "response.output_text.delta" && !parsed.delta.is_empty() {
                        full_text.push_str(&parsed.delta);
                        on_event(StreamEvent::TextDelta(parsed.delta));
                    }
                }
            }
        }

        on_event(StreamEvent::Done);
        Ok(full_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> AiClient {
        AiClient::new("test-key")
            .with_model(MODEL_NANO)
            .with_base_url(server.uri())
    }

    #[test]
    fn build_input_starts_with_system_and_alternates_roles() {
        let client = AiClient::new("k");
        let history = vec![
            "first prompt".to_string(),
            "first reply".to_string(),
            "second prompt".to_string(),
            "second reply".to_string(),
        ];

        let input = client.build_input("hello", &history);
        let items = input.as_array().unwrap();
        assert_eq!(items.len(), 6);
        assert_eq!(items[0]["role"], "system");
        assert_eq!(items[1]["role"], "user");
        assert_eq!(items[1]["content"], "first prompt");
        assert_eq!(items[2]["role"], "assistant");
        assert_eq!(items[3]["role"], "user");
        assert_eq!(items[4]["role"], "assistant");
        assert_eq!(items[5]["role"], "user");
        assert_eq!(items[5]["content"], "hello");
    }

    #[tokio::test]
    async fn generate_extracts_output_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "resp_1",
                "output": [{
                    "type": "message",
                    "content": [{ "type": "output_text", "text": "Once upon a time." }]
                }]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let text = client.generate("hello", &[]).await.unwrap();
        assert_eq!(text, "Once upon a time.");
    }

    #[tokio::test]
    async fn generate_surfaces_upstream_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client.generate("hello", &[]).await.unwrap_err();
        match err {
            AiError::Upstream { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn generate_stream_accumulates_deltas() {
        let server = MockServer::start().await;
        let sse_body = concat!(
            "data: {\"type\":\"response.output_text.delta\",\"delta\":\"Once \"}\n\n",
            "data: {\"type\":\"response.output_text.delta\",\"delta\":\"upon\"}\n\n",
            "data: {\"type\":\"response.completed\"}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "text/event-stream")
                    .set_body_string(sse_body),
            )
            .mount(&server)
            .await;

        let client = test_client(&server);
        let deltas = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&deltas);

        let full = client
            .generate_stream("hello", &[], move |event| {
                if let StreamEvent::TextDelta(text) = event {
                    sink.lock().unwrap().push(text);
                }
            })
            .await
            .unwrap();

        assert_eq!(full, "Once upon");
        assert_eq!(*deltas.lock().unwrap(), vec!["Once ", "upon"]);
    }
}
