// Chat sessions: per-client state machine, controller and HTTP handlers.

pub mod controller;
pub mod handlers;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::chat::log::{ChatTurn, ConversationLog};
use crate::notice::Notice;
use crate::profile::store::ContextStore;
use crate::profile::{ProfileContext, ProfileError, ProfileSource};

/// Lifecycle of a session.
///
/// `Uninitialized → ContextReady → AwaitingInput ⇄ Generating`, with
/// `Failed` reachable only while the profile context is being loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    ContextReady,
    AwaitingInput,
    Generating,
    Failed,
}

/// One client's conversation: its profile context, its log and the audio of
/// the latest reply. Private to that client, never persisted.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    state: SessionState,
    context: ContextStore,
    log: ConversationLog,
    last_audio: Option<Bytes>,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Uninitialized,
            context: ContextStore::new(),
            log: ConversationLog::new(),
            last_audio: None,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn context(&self) -> Option<&ProfileContext> {
        self.context.get()
    }

    pub fn last_audio(&self) -> Option<&Bytes> {
        self.last_audio.as_ref()
    }

    /// `Uninitialized → ContextReady`, or `→ Failed` when the résumé is missing.
    pub async fn initialize(
        &mut self,
        source: &dyn ProfileSource,
        notices: &mut Vec<Notice>,
    ) -> Result<(), ProfileError> {
        match self.context.get_or_init(source, notices).await {
            Ok(_) => {
                if self.state == SessionState::Uninitialized {
                    self.state = SessionState::ContextReady;
                }
                Ok(())
            }
            Err(e) => {
                error!("Session {} failed to initialize: {e}", self.id);
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    /// `ContextReady → AwaitingInput`, adding the greeting to an empty log.
    pub fn seed(&mut self, greeting: &str) {
        if self.state != SessionState::ContextReady {
            return;
        }
        if self.log.is_empty() {
            self.log.append(ChatTurn::synthetic(greeting));
            info!("Chat history initialized for session {}", self.id);
        }
        self.state = SessionState::AwaitingInput;
    }

    /// `AwaitingInput → Generating`, recording the user's turn.
    fn begin_turn(&mut self, query: &str) {
        self.log.append(ChatTurn::user(query));
        self.state = SessionState::Generating;
    }

    fn record_reply(&mut self, turn: ChatTurn) {
        self.log.append(turn);
    }

    fn set_audio(&mut self, audio: Option<Bytes>) {
        self.last_audio = audio;
    }

    /// `Generating → AwaitingInput`.
    fn end_turn(&mut self) {
        self.state = SessionState::AwaitingInput;
    }

    pub fn view(&self, notices: Vec<Notice>) -> SessionView {
        SessionView {
            session_id: self.id,
            state: self.state,
            messages: self.log.all().to_vec(),
            created_at: self.created_at,
            notices,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable snapshot of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub state: SessionState,
    pub messages: Vec<ChatTurn>,
    pub created_at: DateTime<Utc>,
    pub notices: Vec<Notice>,
}
