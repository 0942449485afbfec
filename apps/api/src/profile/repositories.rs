//! Public repository listing from the GitHub REST API.
//!
//! Best-effort: every failure becomes a sentinel summary, never an error.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info, warn};

/// Upper bound on the whole listing request.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const PER_PAGE: u32 = 30;

pub const NO_REPOSITORIES: &str = "No public repositories found or fetch failed.";
pub const TIMEOUT_SUMMARY: &str = "Could not fetch GitHub repositories due to timeout.";
pub const REQUEST_FAILED_SUMMARY: &str = "Could not fetch GitHub repositories.";
pub const UNEXPECTED_SUMMARY: &str = "An unexpected error occurred while fetching GitHub data.";

#[derive(Debug, Deserialize)]
struct RepoEntry {
    name: Option<String>,
    description: Option<String>,
    language: Option<String>,
}

impl RepoEntry {
    fn summary_line(&self) -> String {
        format!(
            "- {}: {} (Lang: {})",
            self.name.as_deref().unwrap_or("N/A"),
            self.description.as_deref().unwrap_or("No description"),
            self.language.as_deref().unwrap_or("N/A"),
        )
    }
}

/// Why the listing could not be produced.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchFailure {
    Timeout,
    Request(String),
    Unexpected(String),
}

impl FetchFailure {
    fn sentinel(&self) -> &'static str {
        match self {
            FetchFailure::Timeout => TIMEOUT_SUMMARY,
            FetchFailure::Request(_) => REQUEST_FAILED_SUMMARY,
            FetchFailure::Unexpected(_) => UNEXPECTED_SUMMARY,
        }
    }

    /// Short text for the user-facing notice.
    pub fn describe(&self) -> String {
        match self {
            FetchFailure::Timeout => "GitHub request timed out.".to_string(),
            FetchFailure::Request(e) => format!("Error fetching GitHub data: {e}"),
            FetchFailure::Unexpected(e) => format!("Unexpected error fetching GitHub data: {e}"),
        }
    }
}

/// Newline-joined repository lines, or a sentinel when `failure` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositorySummary {
    pub text: String,
    pub failure: Option<FetchFailure>,
}

impl RepositorySummary {
    fn failed(failure: FetchFailure) -> Self {
        Self {
            text: failure.sentinel().to_string(),
            failure: Some(failure),
        }
    }
}

#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    api_base: String,
}

impl GithubClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self::with_timeout(api_base, FETCH_TIMEOUT)
    }

    pub fn with_timeout(api_base: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
                .build()
                .expect("Failed to build HTTP client"),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Lists up to 30 most-recently-updated public repositories of `identity`.
    /// One attempt, no retries.
    pub async fn fetch_summary(&self, identity: &str) -> RepositorySummary {
        match self.fetch_entries(identity).await {
            Ok(entries) => {
                info!("Fetched {} repos for {identity}", entries.len());
                let text = if entries.is_empty() {
                    NO_REPOSITORIES.to_string()
                } else {
                    entries
                        .iter()
                        .map(RepoEntry::summary_line)
                        .collect::<Vec<_>>()
                        .join("\n")
                };
                RepositorySummary {
                    text,
                    failure: None,
                }
            }
            Err(e) if e.is_timeout() => {
                warn!("Timeout fetching GitHub repos for {identity}");
                RepositorySummary::failed(FetchFailure::Timeout)
            }
            Err(e) if e.is_decode() => {
                error!("Unexpected GitHub payload for {identity}: {e}");
                RepositorySummary::failed(FetchFailure::Unexpected(e.to_string()))
            }
            Err(e) => {
                error!("Error fetching GitHub repos for {identity}: {e}");
                RepositorySummary::failed(FetchFailure::Request(e.to_string()))
            }
        }
    }

    async fn fetch_entries(&self, identity: &str) -> Result<Vec<RepoEntry>, reqwest::Error> {
        let per_page = PER_PAGE.to_string();
        self.client
            .get(format!("{}/users/{identity}/repos", self.api_base))
            .header("accept", "application/vnd.github+json")
            .query(&[("sort", "updated"), ("per_page", per_page.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<RepoEntry>>()
            .await
    }
}
