//! Response generation — turns (context, history, query) into one displayable reply.
//!
//! Every outcome except a missing credential is folded into reply text so the
//! conversation always has a matching assistant turn for each user turn.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::chat::log::{ChatTurn, Role};
use crate::chat::prompts::build_turn_message;
use crate::llm_client::{ChatMessage, ChatRole, Completion, TextGenerator};
use crate::notice::Notice;
use crate::profile::ProfileContext;

/// Number of prior turns replayed to the model.
pub const HISTORY_WINDOW: usize = 6;

const INVALID_KEY_MARKER: &str = "API key not valid";

#[derive(Debug, Error)]
pub enum GenerationError {
    /// Raised before any network call.
    #[error("AI Service Error: API key not configured.")]
    MissingCredential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Answer,
    Blocked,
    InvalidCredential,
    ServiceError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub kind: ReplyKind,
    pub text: String,
    /// Present for everything but a normal answer.
    pub notice: Option<Notice>,
}

impl Reply {
    fn answer(text: String) -> Self {
        Self {
            kind: ReplyKind::Answer,
            text,
            notice: None,
        }
    }

    pub fn is_answer(&self) -> bool {
        self.kind == ReplyKind::Answer
    }
}

#[derive(Clone)]
pub struct ResponseGenerator {
    llm: Arc<dyn TextGenerator>,
    owner: String,
}

impl ResponseGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>, owner: impl Into<String>) -> Self {
        Self {
            llm,
            owner: owner.into(),
        }
    }

    /// Generates the reply to `query`.
    ///
    /// `history` is the conversation before `query`. Of its last
    /// `HISTORY_WINDOW` turns, the non-synthetic ones are replayed.
    pub async fn generate(
        &self,
        context: &ProfileContext,
        history: &[ChatTurn],
        query: &str,
        credential: &str,
    ) -> Result<Reply, GenerationError> {
        if credential.trim().is_empty() {
            error!("Gemini API key is missing");
            return Err(GenerationError::MissingCredential);
        }

        let replay = windowed_history(history);
        let message = build_turn_message(&self.owner, context, query);

        match self.llm.send_message(credential, &replay, &message).await {
            Ok(Completion::Text(text)) => {
                info!("Generated response ({} chars)", text.len());
                Ok(Reply::answer(text))
            }
            Ok(Completion::Blocked { reason }) => {
                let reason = reason.unwrap_or_else(|| "UNSPECIFIED".to_string());
                warn!("LLM response empty/blocked. Reason: {reason}");
                Ok(Reply {
                    kind: ReplyKind::Blocked,
                    text: format!("I couldn't generate a response for that. Reason: {reason}"),
                    notice: Some(Notice::warning(format!("AI response issue: {reason}"))),
                })
            }
            Err(e) => {
                error!("Error calling Gemini API: {e}");
                let detail = e.to_string();
                if detail.contains(INVALID_KEY_MARKER) {
                    Ok(Reply {
                        kind: ReplyKind::InvalidCredential,
                        text: "AI service error: Invalid API Key.".to_string(),
                        notice: Some(Notice::error("AI Service Error: Invalid Google API Key.")),
                    })
                } else {
                    Ok(Reply {
                        kind: ReplyKind::ServiceError,
                        text: format!("Sorry, I encountered an error: {detail}"),
                        notice: Some(Notice::error(format!("AI Service Error: {detail}"))),
                    })
                }
            }
        }
    }
}

/// Non-synthetic turns among the last `HISTORY_WINDOW`, mapped to model roles.
fn windowed_history(history: &[ChatTurn]) -> Vec<ChatMessage> {
    history[history.len().saturating_sub(HISTORY_WINDOW)..]
        .iter()
        .filter(|t| !t.synthetic)
        .map(|t| ChatMessage {
            role: match t.role {
                Role::User => ChatRole::User,
                Role::Assistant => ChatRole::Model,
            },
            text: t.content.clone(),
        })
        .collect()
}
