//! Session controller — owns every live session and runs chat turns.
//!
//! Flow per session: load profile context once → seed greeting, then per turn:
//! append user turn → generate reply → append reply → synthesize speech.
//! Turns are serialized per session; sessions never share state. A turn runs
//! on its own task so it completes even if the caller goes away.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chat::generator::{GenerationError, ReplyKind, ResponseGenerator, HISTORY_WINDOW};
use crate::chat::log::ChatTurn;
use crate::config::Config;
use crate::errors::AppError;
use crate::llm_client::TextGenerator;
use crate::notice::Notice;
use crate::profile::ProfileSource;
use crate::session::{Session, SessionState, SessionView};
use crate::speech::SpeechSynthesizer;

/// Longest accepted user message, in characters.
pub const MAX_QUERY_CHARS: usize = 4000;

/// Assistant turn recorded when generation produced nothing at all.
pub const FALLBACK_REPLY: &str = "Sorry, I couldn't process that request.";

type SessionHandle = Arc<Mutex<Session>>;

/// Result of one chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub reply: ChatTurn,
    /// `None` when generation never ran (missing credential).
    pub reply_kind: Option<ReplyKind>,
    pub audio_available: bool,
    pub notices: Vec<Notice>,
}

pub struct SessionController {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    profile: Arc<dyn ProfileSource>,
    turns: Arc<TurnRunner>,
    greeting: String,
    max_sessions: usize,
}

/// Everything a detached turn task needs.
struct TurnRunner {
    generator: ResponseGenerator,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    credential: String,
    max_turns: usize,
}

impl SessionController {
    pub fn new(
        config: &Config,
        profile: Arc<dyn ProfileSource>,
        llm: Arc<dyn TextGenerator>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            profile,
            turns: Arc::new(TurnRunner {
                generator: ResponseGenerator::new(llm, config.owner_name.clone()),
                speech,
                credential: config.google_api_key.clone(),
                max_turns: config.max_turns_per_session,
            }),
            greeting: format!("Hi there! I'm {}! ask me anything!", config.owner_name),
            max_sessions: config.max_sessions,
        }
    }

    /// Creates a session, loads its profile context and seeds the greeting.
    /// A missing résumé fails the session and nothing is retained.
    pub async fn create_session(&self) -> Result<SessionView, AppError> {
        if self.session_count().await >= self.max_sessions {
            return Err(AppError::Conflict(format!(
                "Session limit of {} reached",
                self.max_sessions
            )));
        }

        let mut session = Session::new();
        let mut notices = Vec::new();
        session
            .initialize(self.profile.as_ref(), &mut notices)
            .await
            .map_err(|e| AppError::Configuration(format!("Fatal Error: {e}. Cannot proceed.")))?;
        session.seed(&self.greeting);

        let view = session.view(notices);
        let id = session.id();

        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            return Err(AppError::Conflict(format!(
                "Session limit of {} reached",
                self.max_sessions
            )));
        }
        sessions.insert(id, Arc::new(Mutex::new(session)));
        info!("Session {id} created ({} active)", sessions.len());

        Ok(view)
    }

    /// Rejected with `Conflict` while a turn is in flight.
    pub async fn get_session(&self, id: Uuid) -> Result<SessionView, AppError> {
        let handle = self.handle(id).await?;
        let session = handle.try_lock().map_err(|_| busy())?;
        Ok(session.view(Vec::new()))
    }

    /// Runs one turn. Rejected with `Conflict` while another turn is in flight.
    pub async fn submit(&self, id: Uuid, query: &str) -> Result<TurnOutcome, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("Message cannot be empty".to_string()));
        }
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(AppError::Validation(format!(
                "Message exceeds {MAX_QUERY_CHARS} characters"
            )));
        }

        let handle = self.handle(id).await?;
        let mut session = handle.try_lock_owned().map_err(|_| busy())?;
        let runner = Arc::clone(&self.turns);
        let query = query.to_string();

        // The task owns the session lock, so dropping this future cannot
        // strand the session mid-turn.
        tokio::spawn(async move { runner.run(&mut session, &query).await })
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Chat turn task failed: {e}")))?
    }

    pub async fn latest_audio(&self, id: Uuid) -> Result<Bytes, AppError> {
        let handle = self.handle(id).await?;
        let session = handle.try_lock().map_err(|_| busy())?;
        session
            .last_audio()
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No audio for session {id}")))
    }

    /// Drops the session and everything it holds.
    pub async fn end_session(&self, id: Uuid) -> Result<(), AppError> {
        let removed = self.sessions.write().await.remove(&id);
        match removed {
            Some(_) => {
                info!("Session {id} ended");
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Session {id} not found"))),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub(crate) async fn handle(&self, id: Uuid) -> Result<SessionHandle, AppError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
    }
}

fn busy() -> AppError {
    AppError::Conflict("A reply is still being generated for this session".to_string())
}

impl TurnRunner {
    async fn run(&self, session: &mut Session, query: &str) -> Result<TurnOutcome, AppError> {
        if session.state() != SessionState::AwaitingInput {
            return Err(AppError::Conflict(format!(
                "Session is not accepting input (state: {:?})",
                session.state()
            )));
        }
        // A turn adds two entries: the question and its reply.
        if session.log().len() + 2 > self.max_turns {
            return Err(AppError::Validation(
                "Conversation limit reached; start a new session".to_string(),
            ));
        }
        let context = session
            .context()
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Session has no profile context")))?;

        let prior = session.log().tail(HISTORY_WINDOW).to_vec();
        session.begin_turn(query);
        let mut notices = Vec::new();

        let generated = self
            .generator
            .generate(&context, &prior, query, &self.credential)
            .await;

        let (reply, reply_kind) = match generated {
            Ok(reply) => {
                notices.extend(reply.notice.clone());
                let turn = if reply.is_answer() {
                    ChatTurn::assistant(reply.text)
                } else {
                    ChatTurn::synthetic(reply.text)
                };
                (turn, Some(reply.kind))
            }
            Err(e @ GenerationError::MissingCredential) => {
                notices.push(Notice::error(e.to_string()));
                (ChatTurn::synthetic(FALLBACK_REPLY), None)
            }
        };
        session.record_reply(reply.clone());

        let mut audio_available = false;
        if let (Some(speech), Some(_)) = (&self.speech, reply_kind) {
            match speech.synthesize(&reply.content).await {
                Ok(audio) => {
                    session.set_audio(Some(audio));
                    audio_available = true;
                }
                Err(e) => {
                    warn!("TTS generation error: {e}");
                    session.set_audio(None);
                    notices.push(Notice::warning("Could not generate audio for the response."));
                }
            }
        } else {
            session.set_audio(None);
        }

        session.end_turn();

        Ok(TurnOutcome {
            reply,
            reply_kind,
            audio_available,
            notices,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::chat::generator::tests::FakeLlm;
    use crate::chat::log::Role;
    use crate::llm_client::Completion;
    use crate::notice::NoticeLevel;
    use crate::profile::store::tests::FakeProfile;
    use crate::speech::tests::FakeSpeech;

    struct Harness {
        controller: SessionController,
        profile: Arc<FakeProfile>,
        llm: Arc<FakeLlm>,
    }

    fn harness_with(config: Config, profile: FakeProfile, llm: FakeLlm, speech_fails: bool) -> Harness {
        let profile = Arc::new(profile);
        let llm = Arc::new(llm);
        let controller = SessionController::new(
            &config,
            profile.clone(),
            llm.clone(),
            Some(Arc::new(FakeSpeech { fail: speech_fails })),
        );
        Harness {
            controller,
            profile,
            llm,
        }
    }

    fn harness(llm: FakeLlm, speech_fails: bool) -> Harness {
        harness_with(
            Config::for_tests("resume.pdf"),
            FakeProfile::new(Some("Name: Alice\nSkills: Go, Rust"), "- proj1: A tool (Lang: Go)"),
            llm,
            speech_fails,
        )
    }

    #[tokio::test]
    async fn test_new_session_awaits_input_with_greeting() {
        let h = harness(FakeLlm::default(), false);

        let view = h.controller.create_session().await.unwrap();
        assert_eq!(view.state, SessionState::AwaitingInput);
        assert_eq!(view.messages.len(), 1);
        assert_eq!(view.messages[0].content, "Hi there! I'm Alice! ask me anything!");
        assert!(view.notices.iter().any(|n| n.message == "Profile data loaded!"));
    }

    #[tokio::test]
    async fn test_context_is_loaded_once_across_turns() {
        let h = harness(FakeLlm::default(), false);
        let id = h.controller.create_session().await.unwrap().session_id;

        for i in 0..4 {
            h.controller.submit(id, &format!("question {i}")).await.unwrap();
        }

        assert_eq!(h.profile.resume_loads.load(Ordering::SeqCst), 1);
        assert_eq!(h.profile.repository_loads.load(Ordering::SeqCst), 1);
        assert_eq!(h.llm.call_count(), 4);
    }

    #[tokio::test]
    async fn test_missing_resume_fails_session_creation() {
        let h = harness_with(
            Config::for_tests("missing.pdf"),
            FakeProfile::new(None, "- proj1: A tool (Lang: Go)"),
            FakeLlm::default(),
            false,
        );

        let err = h.controller.create_session().await.unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
        assert_eq!(h.controller.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_repository_timeout_still_reaches_awaiting_input() {
        let h = harness_with(
            Config::for_tests("resume.pdf"),
            FakeProfile::timing_out("Name: Alice"),
            FakeLlm::default(),
            false,
        );

        let view = h.controller.create_session().await.unwrap();
        assert_eq!(view.state, SessionState::AwaitingInput);
        assert!(view
            .notices
            .iter()
            .any(|n| n.level == NoticeLevel::Warning && n.message.contains("timed out")));
    }

    #[tokio::test]
    async fn test_turn_appends_user_and_assistant() {
        let h = harness(
            FakeLlm::replying(Ok(Completion::Text("I mostly write Rust.".into()))),
            false,
        );
        let id = h.controller.create_session().await.unwrap().session_id;

        let outcome = h
            .controller
            .submit(id, "What languages does Alice know?")
            .await
            .unwrap();
        assert_eq!(outcome.reply.content, "I mostly write Rust.");
        assert_eq!(outcome.reply_kind, Some(ReplyKind::Answer));
        assert!(outcome.audio_available);

        let view = h.controller.get_session(id).await.unwrap();
        let roles: Vec<Role> = view.messages.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(view.state, SessionState::AwaitingInput);
        assert_eq!(
            &h.controller.latest_audio(id).await.unwrap()[..],
            b"ID3fake"
        );
    }

    #[tokio::test]
    async fn test_current_query_is_not_replayed_as_history() {
        let h = harness(FakeLlm::default(), false);
        let id = h.controller.create_session().await.unwrap().session_id;

        h.controller.submit(id, "first").await.unwrap();

        let calls = h.llm.calls.lock().unwrap();
        assert!(calls[0].0.is_empty());
        assert!(calls[0].1.ends_with("User Question: first"));
    }

    #[tokio::test]
    async fn test_blocked_reply_is_visible_with_reason() {
        let h = harness(
            FakeLlm::replying(Ok(Completion::Blocked {
                reason: Some("SAFETY".into()),
            })),
            false,
        );
        let id = h.controller.create_session().await.unwrap().session_id;

        let outcome = h.controller.submit(id, "something").await.unwrap();
        assert!(outcome.reply.content.contains("SAFETY"));

        let view = h.controller.get_session(id).await.unwrap();
        assert!(view.messages.last().unwrap().content.contains("SAFETY"));
    }

    #[tokio::test]
    async fn test_speech_failure_keeps_single_reply() {
        let h = harness(
            FakeLlm::replying(Ok(Completion::Text("Here is my answer.".into()))),
            true,
        );
        let id = h.controller.create_session().await.unwrap().session_id;

        let outcome = h.controller.submit(id, "question").await.unwrap();
        assert!(!outcome.audio_available);
        assert!(outcome
            .notices
            .iter()
            .any(|n| n.message == "Could not generate audio for the response."));

        let view = h.controller.get_session(id).await.unwrap();
        let count = view
            .messages
            .iter()
            .filter(|t| t.content == "Here is my answer.")
            .count();
        assert_eq!(count, 1);
        assert_eq!(view.state, SessionState::AwaitingInput);
        assert!(matches!(
            h.controller.latest_audio(id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_credential_records_fallback_without_calling_model() {
        let mut config = Config::for_tests("resume.pdf");
        config.google_api_key = String::new();
        let h = harness_with(
            config,
            FakeProfile::new(Some("Name: Alice"), "- proj1: A tool (Lang: Go)"),
            FakeLlm::default(),
            false,
        );
        let id = h.controller.create_session().await.unwrap().session_id;

        let outcome = h.controller.submit(id, "hello").await.unwrap();
        assert_eq!(outcome.reply.content, FALLBACK_REPLY);
        assert_eq!(outcome.reply_kind, None);
        assert!(!outcome.audio_available);
        assert_eq!(outcome.notices[0].level, NoticeLevel::Error);
        assert_eq!(h.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_submission_rejected_while_turn_in_flight() {
        let h = harness(FakeLlm::default(), false);
        let id = h.controller.create_session().await.unwrap().session_id;

        let handle = h.controller.handle(id).await.unwrap();
        let _busy = handle.lock().await;

        let err = h.controller.submit(id, "hello").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_empty_and_oversized_messages_rejected() {
        let h = harness(FakeLlm::default(), false);
        let id = h.controller.create_session().await.unwrap().session_id;

        assert!(matches!(
            h.controller.submit(id, "   ").await,
            Err(AppError::Validation(_))
        ));
        let long = "x".repeat(MAX_QUERY_CHARS + 1);
        assert!(matches!(
            h.controller.submit(id, &long).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(h.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_turn_cap_is_enforced() {
        let mut config = Config::for_tests("resume.pdf");
        config.max_turns_per_session = 4;
        let h = harness_with(
            config,
            FakeProfile::new(Some("Name: Alice"), "- proj1: A tool (Lang: Go)"),
            FakeLlm::default(),
            false,
        );
        let id = h.controller.create_session().await.unwrap().session_id;

        h.controller.submit(id, "one").await.unwrap();
        // Greeting plus one exchange is 3; another exchange would make 5.
        let err = h.controller.submit(id, "two").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let view = h.controller.get_session(id).await.unwrap();
        assert_eq!(view.messages.len(), 3);
        assert_eq!(view.state, SessionState::AwaitingInput);
        assert_eq!(h.llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_submission_still_completes_turn() {
        let h = harness(FakeLlm::slow(Duration::from_millis(300)), false);
        let id = h.controller.create_session().await.unwrap().session_id;

        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), h.controller.submit(id, "first")).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;

        let view = h.controller.get_session(id).await.unwrap();
        assert_eq!(view.state, SessionState::AwaitingInput);
        assert_eq!(view.messages.len(), 3);
        assert_eq!(view.messages[1].content, "first");
        assert_eq!(view.messages[2].content, "ok");

        let outcome = h.controller.submit(id, "second").await.unwrap();
        assert_eq!(outcome.reply.content, "ok");
        assert_eq!(h.llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_reads_do_not_wait_for_turn_in_flight() {
        let h = harness(FakeLlm::default(), false);
        let id = h.controller.create_session().await.unwrap().session_id;

        let handle = h.controller.handle(id).await.unwrap();
        let busy = handle.lock().await;

        assert!(matches!(
            h.controller.get_session(id).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            h.controller.latest_audio(id).await,
            Err(AppError::Conflict(_))
        ));

        drop(busy);
        assert!(h.controller.get_session(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_session_cap_and_teardown() {
        let mut config = Config::for_tests("resume.pdf");
        config.max_sessions = 1;
        let h = harness_with(
            config,
            FakeProfile::new(Some("Name: Alice"), "- proj1: A tool (Lang: Go)"),
            FakeLlm::default(),
            false,
        );

        let id = h.controller.create_session().await.unwrap().session_id;
        assert!(matches!(
            h.controller.create_session().await,
            Err(AppError::Conflict(_))
        ));

        h.controller.end_session(id).await.unwrap();
        assert!(matches!(
            h.controller.get_session(id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(h.controller.create_session().await.is_ok());
    }
}
