/// LLM Client — the single point of entry for all Gemini API calls.
///
/// No other module may call the generation API directly; everything goes
/// through the `TextGenerator` seam so the chat layer can be tested offline.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Role tag understood by the generation API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// One prior message replayed to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

/// Result of a completed generation call.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Text(String),
    /// The service answered but withheld the output.
    Blocked { reason: Option<String> },
}

/// Stateless chat-style text generation: replay `history`, then send `message`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn send_message(
        &self,
        api_key: &str,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<Completion, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types (generateContent)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: ChatRole,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

impl GenerateContentResponse {
    fn into_completion(self) -> Completion {
        let first = self.candidates.into_iter().next();
        let text: String = first
            .as_ref()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default();

        if !text.is_empty() {
            return Completion::Text(text);
        }

        let reason = self
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .or_else(|| first.and_then(|c| c.finish_reason).filter(|r| r != "STOP"));
        Completion::Blocked { reason }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini client
// ────────────────────────────────────────────────────────────────────────────

/// The generation client used by the chat layer.
/// One attempt per call and no client-side timeout.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_base: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_base: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn send_message(
        &self,
        api_key: &str,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<Completion, LlmError> {
        let mut contents: Vec<Content<'_>> = history
            .iter()
            .map(|m| Content {
                role: m.role,
                parts: vec![Part { text: &m.text }],
            })
            .collect();
        contents.push(Content {
            role: ChatRole::User,
            parts: vec![Part { text: message }],
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&GenerateContentRequest { contents })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;
        debug!(
            "Gemini call succeeded: {} candidate(s)",
            parsed.candidates.len()
        );
        Ok(parsed.into_completion())
    }
}
