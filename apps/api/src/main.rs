mod chat;
mod config;
mod errors;
mod llm_client;
mod notice;
mod profile;
mod routes;
mod session;
mod speech;
mod state;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::GeminiClient;
use crate::profile::repositories::GithubClient;
use crate::profile::ProfileLoader;
use crate::routes::build_router;
use crate::session::controller::SessionController;
use crate::speech::{GoogleTts, SpeechSynthesizer, DEFAULT_TTS_ENDPOINT};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing identity or credential)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Folio API v{}", env!("CARGO_PKG_VERSION"));

    // Profile sources: résumé on disk + GitHub listing
    let profile = ProfileLoader::new(
        config.resume_path.clone(),
        config.github_username.clone(),
        GithubClient::new(config.github_api_base.clone()),
    );
    info!(
        "Profile loader initialized (resume: {}, github: {})",
        config.resume_path.display(),
        config.github_username
    );

    // Initialize LLM client
    let llm = GeminiClient::new(config.gemini_api_base.clone(), config.gemini_model.clone());
    info!("LLM client initialized (model: {})", llm.model());

    // Text-to-speech is optional
    let speech: Option<Arc<dyn SpeechSynthesizer>> = if config.tts_enabled {
        info!("Speech synthesis enabled (lang: {})", config.tts_lang);
        Some(Arc::new(GoogleTts::new(
            DEFAULT_TTS_ENDPOINT,
            config.tts_lang.clone(),
        )))
    } else {
        None
    };

    let sessions = SessionController::new(&config, Arc::new(profile), Arc::new(llm), speech);

    let state = AppState {
        config: config.clone(),
        sessions: Arc::new(sessions),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
