use std::error::Error;
use std::fmt;

/// Gemini's error `status` for quota and rate-limit rejections.
const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

/// Failure reported by the remote model API.
///
/// Rate limiting is tagged explicitly so the retry policy never has to
/// inspect message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// HTTP 429 or a `RESOURCE_EXHAUSTED` error body.
    RateLimited { status: u16, message: String },
    /// Any other non-success HTTP response.
    Rejected { status: u16, message: String },
    /// The credential cannot be used to build a request at all.
    InvalidCredential(String),
    /// The request never produced an HTTP response.
    Transport(String),
    /// A 200 response with no usable text.
    EmptyResponse(String),
}

impl ApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }

    /// Classifies a non-success response from its status code and body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<serde_json::Value>(body.trim()).ok();
        let error_status = parsed
            .as_ref()
            .and_then(|value| value.pointer("/error/status"))
            .and_then(|value| value.as_str());
        let message = format_api_error(body);

        if status == 429 || error_status == Some(RESOURCE_EXHAUSTED) {
            ApiError::RateLimited { status, message }
        } else {
            ApiError::Rejected { status, message }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::RateLimited { status, message } | ApiError::Rejected { status, message } => {
                write!(f, "[{status}] {message}")
            }
            ApiError::InvalidCredential(reason) => write!(f, "Invalid API key: {reason}"),
            ApiError::Transport(reason) => write!(f, "Request failed: {reason}"),
            ApiError::EmptyResponse(reason) => write!(f, "{reason}"),
        }
    }
}

impl Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Reduces an error body to a single displayable line.
///
/// JSON bodies yield their `error.message`; anything else is returned
/// trimmed, with whitespace collapsed.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "<empty response body>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value).filter(|s| !s.is_empty()) {
            return summary;
        }
        return json_value.to_string();
    }

    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}
