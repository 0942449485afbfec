use std::sync::Arc;

use crate::config::Config;
use crate::session::controller::SessionController;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Owns every live chat session.
    pub sessions: Arc<SessionController>,
}
