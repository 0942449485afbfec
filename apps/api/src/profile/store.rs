//! Per-session memo of the profile context.

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::notice::Notice;
use crate::profile::resume::RESUME_READ_ERROR;
use crate::profile::{
    ProfileContext, ProfileError, ProfileSource, GITHUB_UNAVAILABLE, RESUME_UNAVAILABLE,
};

/// Holds the profile context for one session. Filled at most once; there is
/// no invalidation, a new session always re-fetches.
#[derive(Debug, Default)]
pub struct ContextStore {
    cell: OnceCell<ProfileContext>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached context, loading it from `source` on first access.
    /// Notices raised while loading are pushed onto `notices`.
    pub async fn get_or_init(
        &self,
        source: &dyn ProfileSource,
        notices: &mut Vec<Notice>,
    ) -> Result<&ProfileContext, ProfileError> {
        self.cell
            .get_or_try_init(|| build_context(source, notices))
            .await
    }

    pub fn get(&self) -> Option<&ProfileContext> {
        self.cell.get()
    }
}

async fn build_context(
    source: &dyn ProfileSource,
    notices: &mut Vec<Notice>,
) -> Result<ProfileContext, ProfileError> {
    info!("Loading profile context...");

    // A missing résumé is fatal; don't bother with the network in that case.
    let resume = source.load_resume().await?;
    let resume_text = if resume == RESUME_READ_ERROR {
        warn!("Resume was found but could not be read");
        notices.push(Notice::warning(format!(
            "There was an issue reading the resume PDF: {resume}"
        )));
        RESUME_UNAVAILABLE.to_string()
    } else if resume.trim().is_empty() {
        RESUME_UNAVAILABLE.to_string()
    } else {
        resume
    };

    let repositories = source.load_repositories().await;
    if let Some(failure) = &repositories.failure {
        notices.push(Notice::warning(failure.describe()));
    }
    let repository_summary = if repositories.text.trim().is_empty() {
        GITHUB_UNAVAILABLE.to_string()
    } else {
        repositories.text
    };

    info!("Profile context loaded");
    notices.push(Notice::info("Profile data loaded!"));

    Ok(ProfileContext {
        resume_text,
        repository_summary,
    })
}
