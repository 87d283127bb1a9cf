//! The narrow contract between the session controller and the remote model.
//!
//! [`ModelApi`] turns a credential plus sampling parameters into a
//! [`ChatSession`]; a session exchanges one text turn at a time and keeps
//! its own history. [`GeminiClient`] is the production implementation over
//! the Gemini REST API.

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use tracing::debug;

use crate::api::{
    ApiError, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
};
use crate::utils::url::model_method_url;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[async_trait]
pub trait ChatSession: Send {
    /// Sends one user turn and returns the model's reply.
    ///
    /// History only grows when the exchange succeeds.
    async fn send(&mut self, text: &str) -> Result<String, ApiError>;

    fn history(&self) -> &[Content];
}

pub trait ModelApi: Send + Sync {
    type Session: ChatSession;

    /// Builds a fresh session with empty history bound to `credential`.
    fn start_chat(
        &self,
        credential: &str,
        config: &GenerationConfig,
    ) -> Result<Self::Session, ApiError>;
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ModelApi for GeminiClient {
    type Session = GeminiSession;

    fn start_chat(
        &self,
        credential: &str,
        config: &GenerationConfig,
    ) -> Result<GeminiSession, ApiError> {
        let api_key = credential_header(credential)?;
        Ok(GeminiSession {
            http: self.http.clone(),
            url: model_method_url(&self.base_url, &self.model, "generateContent"),
            api_key,
            config: *config,
            history: Vec::new(),
        })
    }
}

fn credential_header(credential: &str) -> Result<HeaderValue, ApiError> {
    if credential.trim().is_empty() {
        return Err(ApiError::InvalidCredential("key is empty".to_string()));
    }
    if credential.chars().any(char::is_whitespace) {
        return Err(ApiError::InvalidCredential(
            "key contains whitespace".to_string(),
        ));
    }
    let mut value = HeaderValue::from_str(credential).map_err(|_| {
        ApiError::InvalidCredential("key contains characters not allowed in a header".to_string())
    })?;
    value.set_sensitive(true);
    Ok(value)
}

pub struct GeminiSession {
    http: reqwest::Client,
    url: String,
    api_key: HeaderValue,
    config: GenerationConfig,
    history: Vec<Content>,
}

#[async_trait]
impl ChatSession for GeminiSession {
    async fn send(&mut self, text: &str) -> Result<String, ApiError> {
        let mut contents = self.history.clone();
        contents.push(Content::user(text));

        let request = GenerateContentRequest {
            contents: &contents,
            generation_config: self.config,
        };

        debug!(url = %self.url, turns = contents.len(), "Sending generateContent request");
        let response = self
            .http
            .post(&self.url)
            .header(API_KEY_HEADER, self.api_key.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            let err = ApiError::from_response(status.as_u16(), &error_text);
            debug!(status = status.as_u16(), rate_limited = err.is_rate_limited(), "generateContent failed");
            return Err(err);
        }

        let body = response.json::<GenerateContentResponse>().await?;
        let reply = body
            .text()
            .ok_or_else(|| ApiError::EmptyResponse(body.empty_reason()))?;

        contents.push(Content::model(reply.clone()));
        self.history = contents;
        Ok(reply)
    }

    fn history(&self) -> &[Content] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ROLE_MODEL, ROLE_USER};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::Mutex;

    type CapturedRequests = Arc<Mutex<Vec<(String, Option<String>, serde_json::Value)>>>;

    fn generation() -> GenerationConfig {
        GenerationConfig {
            temperature: 0.9,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 8192,
        }
    }

    fn test_http_client() -> reqwest::Client {
        reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("client should build")
    }

    async fn read_http_request(
        stream: &mut TcpStream,
    ) -> Result<(String, Vec<(String, String)>, Vec<u8>), String> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            if let Some(pos) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
                break pos;
            }
            let read = stream.read(&mut chunk).await.map_err(|err| err.to_string())?;
            if read == 0 {
                return Err("Unexpected EOF while reading HTTP headers".to_string());
            }
            buffer.extend_from_slice(&chunk[..read]);
        };

        let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or_default().to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .collect();
        let content_length = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.parse::<usize>().ok())
            .unwrap_or(0);

        let mut body = buffer[header_end + 4..].to_vec();
        while body.len() < content_length {
            let read = stream.read(&mut chunk).await.map_err(|err| err.to_string())?;
            if read == 0 {
                return Err("Unexpected EOF while reading HTTP body".to_string());
            }
            body.extend_from_slice(&chunk[..read]);
        }
        body.truncate(content_length);

        Ok((request_line, headers, body))
    }

    /// Serves one scripted `(status line, body)` per connection.
    async fn spawn_stub(
        responses: Vec<(&'static str, String)>,
    ) -> (String, CapturedRequests, tokio::task::JoinHandle<Result<(), String>>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("local addr should resolve");
        let captured: CapturedRequests = Arc::new(Mutex::new(Vec::new()));
        let captured_for_server = Arc::clone(&captured);

        let server = tokio::spawn(async move {
            for (status_line, body) in responses {
                let (mut stream, _) = listener.accept().await.map_err(|err| err.to_string())?;
                let (request_line, headers, request_body) = read_http_request(&mut stream).await?;
                let api_key = headers
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(API_KEY_HEADER))
                    .map(|(_, value)| value.clone());
                let json: serde_json::Value = if request_body.is_empty() {
                    serde_json::Value::Null
                } else {
                    serde_json::from_slice(&request_body).map_err(|err| err.to_string())?
                };
                captured_for_server
                    .lock()
                    .await
                    .push((request_line, api_key, json));

                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\nconnection: close\r\ncontent-length: {}\r\n\r\n{}",
                    body.len(),
                    body
                );
                stream
                    .write_all(response.as_bytes())
                    .await
                    .map_err(|err| err.to_string())?;
                stream.shutdown().await.map_err(|err| err.to_string())?;
            }
            Ok(())
        });

        (format!("http://{addr}/v1beta"), captured, server)
    }

    fn reply_body(text: &str) -> String {
        serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        })
        .to_string()
    }

    #[test]
    fn start_chat_rejects_malformed_credentials() {
        let client = GeminiClient::new(test_http_client(), "http://localhost/v1beta", "gemini-pro");

        for credential in ["", "   ", "two words", "line\nbreak"] {
            let result = client.start_chat(credential, &generation());
            assert!(
                matches!(result, Err(ApiError::InvalidCredential(_))),
                "credential {credential:?} should be rejected"
            );
        }
        assert!(client.start_chat("AIzaSyValidLooking", &generation()).is_ok());
    }

    #[tokio::test]
    async fn send_carries_history_and_credential() {
        let (base_url, captured, server) = spawn_stub(vec![
            ("200 OK", reply_body("Hello!")),
            ("200 OK", reply_body("Still here.")),
        ])
        .await;

        let client = GeminiClient::new(test_http_client(), base_url, "gemini-1.5-pro-002");
        let mut session = client.start_chat("key-one", &generation()).unwrap();

        assert_eq!(session.send("hi").await.unwrap(), "Hello!");
        assert_eq!(session.send("are you there?").await.unwrap(), "Still here.");
        server.await.unwrap().unwrap();

        let history = session.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].role, ROLE_USER);
        assert_eq!(history[3].role, ROLE_MODEL);
        assert_eq!(history[3].parts[0].text, "Still here.");

        let captured = captured.lock().await;
        let (request_line, api_key, first_body) = &captured[0];
        assert_eq!(
            request_line,
            "POST /v1beta/models/gemini-1.5-pro-002:generateContent HTTP/1.1"
        );
        assert_eq!(api_key.as_deref(), Some("key-one"));
        assert_eq!(first_body["contents"].as_array().unwrap().len(), 1);
        assert_eq!(first_body["generationConfig"]["topK"], 40);

        let (_, _, second_body) = &captured[1];
        assert_eq!(second_body["contents"].as_array().unwrap().len(), 3);
        assert_eq!(second_body["contents"][1]["role"], "model");
    }

    #[tokio::test]
    async fn rate_limit_is_tagged_and_history_untouched() {
        let body = serde_json::json!({
            "error": {
                "code": 429,
                "message": "Resource has been exhausted (e.g. check quota).",
                "status": "RESOURCE_EXHAUSTED"
            }
        })
        .to_string();
        let (base_url, _captured, server) = spawn_stub(vec![("429 Too Many Requests", body)]).await;

        let client = GeminiClient::new(test_http_client(), base_url, "gemini-pro");
        let mut session = client.start_chat("key-one", &generation()).unwrap();

        let err = session.send("hi").await.unwrap_err();
        server.await.unwrap().unwrap();

        assert!(err.is_rate_limited());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn model_listing_reuses_the_client_connection_settings() {
        let body = serde_json::json!({
            "models": [{"name": "models/gemini-pro", "supportedGenerationMethods": ["generateContent"]}]
        })
        .to_string();
        let (base_url, captured, server) = spawn_stub(vec![("200 OK", body)]).await;

        let client = GeminiClient::new(test_http_client(), base_url, "gemini-pro");
        let models = crate::api::models::fetch_models(client.http(), client.base_url(), "key-one")
            .await
            .expect("listing should succeed");
        server.await.unwrap().unwrap();

        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id(), "gemini-pro");
        let requests = captured.lock().await;
        assert!(requests[0].0.starts_with("GET /v1beta/models?"));
        assert_eq!(requests[0].1.as_deref(), Some("key-one"));
    }

    #[tokio::test]
    async fn blocked_prompt_is_an_empty_response() {
        let body = serde_json::json!({"promptFeedback": {"blockReason": "SAFETY"}}).to_string();
        let (base_url, _captured, server) = spawn_stub(vec![("200 OK", body)]).await;

        let client = GeminiClient::new(test_http_client(), base_url, "gemini-pro");
        let mut session = client.start_chat("key-one", &generation()).unwrap();

        let err = session.send("hi").await.unwrap_err();
        server.await.unwrap().unwrap();

        assert_eq!(
            err,
            ApiError::EmptyResponse("Prompt was blocked: SAFETY".to_string())
        );
        assert!(session.history().is_empty());
    }
}
