use std::path::PathBuf;

use anyhow::{bail, Context, Result};

const PLACEHOLDER_USERNAME: &str = "YOUR_GITHUB_USERNAME";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub github_username: String,
    pub google_api_key: String,
    pub resume_path: PathBuf,
    /// Name the assistant speaks as. Defaults to the GitHub username.
    pub owner_name: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub github_api_base: String,
    pub tts_lang: String,
    pub tts_enabled: bool,
    pub max_sessions: usize,
    pub max_turns_per_session: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let github_username = require_env("GITHUB_USERNAME")?;
        if github_username == PLACEHOLDER_USERNAME {
            bail!("GITHUB_USERNAME is still set to the placeholder '{PLACEHOLDER_USERNAME}'");
        }

        Ok(Config {
            google_api_key: require_env("GOOGLE_API_KEY")?,
            resume_path: PathBuf::from(env_or("RESUME_PATH", "resume.pdf")),
            owner_name: env_or("PROFILE_OWNER_NAME", &github_username),
            gemini_model: env_or("GEMINI_MODEL", "gemini-2.0-flash"),
            gemini_api_base: env_or(
                "GEMINI_API_BASE",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            github_api_base: env_or("GITHUB_API_BASE", "https://api.github.com"),
            tts_lang: env_or("TTS_LANG", "en"),
            tts_enabled: env_or("TTS_ENABLED", "true")
                .parse::<bool>()
                .context("TTS_ENABLED must be 'true' or 'false'")?,
            max_sessions: env_or("MAX_SESSIONS", "1000")
                .parse::<usize>()
                .context("MAX_SESSIONS must be a positive integer")?,
            max_turns_per_session: env_or("MAX_TURNS_PER_SESSION", "200")
                .parse::<usize>()
                .context("MAX_TURNS_PER_SESSION must be a positive integer")?,
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
            github_username,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    let value = std::env::var(key)
        .with_context(|| format!("Required environment variable '{key}' is not set"))?;
    if value.trim().is_empty() {
        bail!("Required environment variable '{key}' is empty");
    }
    Ok(value)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
impl Config {
    /// Config pointing at local stubs; used by module tests.
    pub fn for_tests(resume_path: impl Into<PathBuf>) -> Self {
        Config {
            github_username: "alice".to_string(),
            google_api_key: "test-key".to_string(),
            resume_path: resume_path.into(),
            owner_name: "Alice".to_string(),
            gemini_model: "gemini-2.0-flash".to_string(),
            gemini_api_base: "http://127.0.0.1:9".to_string(),
            github_api_base: "http://127.0.0.1:9".to_string(),
            tts_lang: "en".to_string(),
            tts_enabled: true,
            max_sessions: 8,
            max_turns_per_session: 200,
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}
