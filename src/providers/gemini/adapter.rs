use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;

use super::models::*;
use crate::config::DEFAULT_BASE_URL;
use crate::providers::traits::AiProvider;
use crate::providers::types::*;

pub struct GeminiProvider {
    client: Client,
}

impl GeminiProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn base_url(custom: Option<&str>) -> &str {
        custom.unwrap_or(DEFAULT_BASE_URL)
    }

    /// Parse an API error response body into a user-friendly message.
    fn parse_error_message(status: reqwest::StatusCode, body: &str) -> String {
        // Try to extract a message from Gemini's JSON error format
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(body) {
            if let Some(msg) = parsed["error"]["message"].as_str() {
                return format!("HTTP {}: {}", status.as_u16(), msg);
            }
        }
        format!("HTTP {}: Request failed", status.as_u16())
    }

    fn build_contents(messages: &[ChatMessage]) -> Vec<GeminiContent> {
        messages
            .iter()
            .map(|msg| GeminiContent {
                role: msg.role.as_str().to_string(),
                parts: msg
                    .parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::InlineData { mime_type, data } => GeminiPart {
                            text: None,
                            inline_data: Some(GeminiInlineData {
                                mime_type: mime_type.clone(),
                                data: data.clone(),
                            }),
                        },
                        ContentPart::Text(text) => GeminiPart::text(text.clone()),
                    })
                    .collect(),
            })
            .collect()
    }

    fn build_request(request: &ChatRequest) -> GeminiRequest {
        let system_instruction = request.system_prompt.as_ref().map(|prompt| GeminiContent {
            role: "user".to_string(),
            parts: vec![GeminiPart::text(prompt.clone())],
        });

        GeminiRequest {
            contents: Self::build_contents(&request.messages),
            system_instruction,
        }
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn stream_message(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        use super::stream::parse_sse_stream;

        let base = Self::base_url(request.base_url.as_deref());
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            base, request.model
        );

        let gemini_request = Self::build_request(&request);

        tracing::debug!(model = %request.model, contents = gemini_request.contents.len(), "Starting Gemini stream");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &request.api_key)
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ProviderError::AuthError("Invalid API key".to_string()));
        }

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed(Self::parse_error_message(
                status, &body,
            )));
        }

        parse_sse_stream(response, tx).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const STREAM_PATH: &str = "/models/gemini-test:streamGenerateContent";

    fn request(base_url: String) -> ChatRequest {
        ChatRequest {
            api_key: "test-key".to_string(),
            model: "gemini-test".to_string(),
            base_url: Some(base_url),
            system_prompt: Some("Be brief.".to_string()),
            messages: vec![ChatMessage {
                role: Role::User,
                parts: vec![
                    ContentPart::InlineData {
                        mime_type: "image/png".to_string(),
                        data: "iVBORw0KGgo=".to_string(),
                    },
                    ContentPart::Text("What is this?".to_string()),
                ],
            }],
        }
    }

    fn sse(payloads: &[&str]) -> String {
        payloads
            .iter()
            .map(|p| format!("data: {}\r\n\r\n", p))
            .collect()
    }

    async fn collect(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_streams_tokens_then_done() {
        let server = MockServer::start().await;
        let body = sse(&[
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"}]}}]}"#,
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"lo"}]}}],"usageMetadata":{"promptTokenCount":7,"candidatesTokenCount":2}}"#,
        ]);
        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .and(query_param("alt", "sse"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (tx, rx) = mpsc::channel(16);
        GeminiProvider::new()
            .stream_message(request(server.uri()), tx)
            .await
            .unwrap();

        let events = collect(rx).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Token("Hel".to_string()),
                StreamEvent::Token("lo".to_string()),
                StreamEvent::Done {
                    tokens_in: Some(7),
                    tokens_out: Some(2),
                },
            ]
        );

        let received = server.received_requests().await.unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(sent["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(sent["contents"][0]["role"], "user");
        let parts = sent["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["text"], "What is this?");
    }

    #[tokio::test]
    async fn test_error_payload_ends_stream() {
        let server = MockServer::start().await;
        let body = sse(&[
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"}]}}]}"#,
            r#"{"error":{"message":"backend overloaded"}}"#,
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"never"}]}}]}"#,
        ]);
        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let (tx, rx) = mpsc::channel(16);
        GeminiProvider::new()
            .stream_message(request(server.uri()), tx)
            .await
            .unwrap();

        assert_eq!(
            collect(rx).await,
            vec![
                StreamEvent::Token("Hel".to_string()),
                StreamEvent::Error("backend overloaded".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_payload_is_error_without_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("data: {not json\n\ndata: <html>oops\n\n"),
            )
            .mount(&server)
            .await;

        let (tx, rx) = mpsc::channel(16);
        GeminiProvider::new()
            .stream_message(request(server.uri()), tx)
            .await
            .unwrap();

        let events = collect(rx).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::Error(msg) if msg.starts_with("Invalid response")));
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let (tx, _rx) = mpsc::channel(16);
        let err = GeminiProvider::new()
            .stream_message(request(server.uri()), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::AuthError(_)));
    }

    #[tokio::test]
    async fn test_server_error_message_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"error":{"code":400,"message":"Unsupported MIME type"}}"#),
            )
            .mount(&server)
            .await;

        let (tx, _rx) = mpsc::channel(16);
        let err = GeminiProvider::new()
            .stream_message(request(server.uri()), tx)
            .await
            .unwrap_err();
        match err {
            ProviderError::RequestFailed(msg) => {
                assert_eq!(msg, "HTTP 400: Unsupported MIME type");
            }
            other => panic!("Expected RequestFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_reads_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
            .mount(&server)
            .await;

        let (tx, _rx) = mpsc::channel(16);
        let err = GeminiProvider::new()
            .stream_message(request(server.uri()), tx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::RateLimited {
                retry_after_secs: Some(12)
            }
        ));
    }
}
