//! `POST /api/mindmap`: expand a keyword into related short labels using an
//! OpenAI-compatible chat completions endpoint.

use crate::AppState;
use crate::config::OpenAiConfig;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

const REQUEST_TIMEOUT_SECS: u64 = 60;
const CONNECT_TIMEOUT_SECS: u64 = 10;
const TEMPERATURE: f64 = 0.7;

const SYSTEM_PROMPT: &str = "You are a mindmap assistant. For the keyword the user gives, \
list 5 to 8 closely related subtopics or concepts as very short phrases (ideally under 10 \
characters each, in the keyword's language). Reply with a single JSON array of strings and \
nothing else, for example [\"item 1\",\"item 2\",\"item 3\"].";

#[derive(Debug, Error)]
pub enum MindmapError {
    #[error("Request body is not valid JSON")]
    InvalidJson,
    #[error("keyword is required")]
    EmptyKeyword,
    #[error("OPENAI_API_KEY is not configured")]
    MissingApiKey,
    #[error("failed to build HTTP client: {0}")]
    HttpClientBuild(String),
    #[error("AI generation failed")]
    Upstream(String),
}

impl MindmapError {
    fn status(&self) -> StatusCode {
        match self {
            MindmapError::InvalidJson | MindmapError::EmptyKeyword => StatusCode::BAD_REQUEST,
            MindmapError::MissingApiKey
            | MindmapError::HttpClientBuild(_)
            | MindmapError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MindmapError {
    fn into_response(self) -> Response {
        if let MindmapError::Upstream(detail) = &self {
            error!("Mindmap upstream error: {}", detail);
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct MindmapRequest {
    keyword: Option<Value>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MindmapResponse {
    pub nodes: Vec<String>,
}

/// Trimmed keyword from a raw request body.
fn parse_keyword(body: &str) -> Result<String, MindmapError> {
    let request: MindmapRequest =
        serde_json::from_str(body).map_err(|_| MindmapError::InvalidJson)?;
    let keyword = match request.keyword {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    };
    if keyword.is_empty() {
        return Err(MindmapError::EmptyKeyword);
    }
    Ok(keyword)
}

/// Extract labels from the model's reply. The reply must be JSON; anything
/// other than an array yields no labels. Non-string entries are dropped and
/// the rest trimmed, blanks removed.
pub fn parse_nodes(raw: &str) -> Result<Vec<String>, MindmapError> {
    let raw = raw.trim();
    let raw = if raw.is_empty() { "[]" } else { raw };
    let parsed: Value = serde_json::from_str(raw)
        .map_err(|e| MindmapError::Upstream(format!("model reply is not JSON: {}", e)))?;
    let nodes = match parsed {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    };
    Ok(nodes)
}

/// Chat completions client for the mindmap prompt.
pub struct MindmapClient {
    http: reqwest::Client,
    config: OpenAiConfig,
}

impl MindmapClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, MindmapError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| MindmapError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// Ask the model for labels related to `keyword`.
    pub async fn generate(&self, keyword: &str) -> Result<Vec<String>, MindmapError> {
        let body = ChatRequest {
            model: &self.config.model,
            temperature: TEMPERATURE,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Keyword: {}", keyword),
                },
            ],
        };
        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MindmapError::Upstream(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| MindmapError::Upstream(e.to_string()))?;
        if !status.is_success() {
            return Err(MindmapError::Upstream(format!("status {}: {}", status, text)));
        }

        let reply: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| MindmapError::Upstream(format!("invalid completion: {}", e)))?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        parse_nodes(&content)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: [ChatMessage; 2],
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Mindmap generation handler
pub async fn generate_mindmap(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<MindmapResponse>, MindmapError> {
    let client = state.mindmap.as_ref().ok_or(MindmapError::MissingApiKey)?;
    let keyword = parse_keyword(&body)?;
    let nodes = client.generate(&keyword).await?;
    info!("Generated {} mindmap nodes for {:?}", nodes.len(), keyword);
    Ok(Json(MindmapResponse { nodes }))
}
