// Profile context: résumé text + recent repository summary, computed once per session.

pub mod repositories;
pub mod resume;
pub mod store;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::profile::repositories::{GithubClient, RepositorySummary};

/// Substituted into the prompt when the résumé was found but could not be read.
pub const RESUME_UNAVAILABLE: &str = "Resume data unavailable or unreadable.";
/// Substituted into the prompt when the repository summary came back empty.
pub const GITHUB_UNAVAILABLE: &str = "GitHub data unavailable.";

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Resume file '{}' not found", .0.display())]
    NotFound(PathBuf),
}

/// Grounding material handed to the model on every turn. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileContext {
    pub resume_text: String,
    pub repository_summary: String,
}

/// Where profile data comes from. `ProfileLoader` is the production source.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn load_resume(&self) -> Result<String, ProfileError>;
    async fn load_repositories(&self) -> RepositorySummary;
}

/// Loads the résumé from disk and the repository listing from GitHub.
pub struct ProfileLoader {
    resume_path: PathBuf,
    identity: String,
    github: GithubClient,
}

impl ProfileLoader {
    pub fn new(resume_path: PathBuf, identity: String, github: GithubClient) -> Self {
        Self {
            resume_path,
            identity,
            github,
        }
    }
}

#[async_trait]
impl ProfileSource for ProfileLoader {
    async fn load_resume(&self) -> Result<String, ProfileError> {
        resume::load_resume(&self.resume_path).await
    }

    async fn load_repositories(&self) -> RepositorySummary {
        self.github.fetch_summary(&self.identity).await
    }
}
