//! Résumé loading — PDF text extraction plus whitespace cleanup.

use std::path::Path;

use tracing::{error, info};

use crate::profile::ProfileError;

/// Returned in place of the text when the file exists but extraction fails.
pub const RESUME_READ_ERROR: &str = "Error reading resume file.";

/// Appended after every page that produced text.
const PAGE_BREAK: &str = "\n---\n";

/// Extracts and normalizes the text of every page of the PDF at `path`.
///
/// A missing file is the only error. Any extraction failure, including a
/// panic inside the PDF parser, yields `RESUME_READ_ERROR` instead.
pub async fn load_resume(path: &Path) -> Result<String, ProfileError> {
    if !path.exists() {
        error!("Resume PDF not found at {}", path.display());
        return Err(ProfileError::NotFound(path.to_path_buf()));
    }

    let owned = path.to_path_buf();
    let extracted =
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_by_pages(&owned)).await;

    match extracted {
        Ok(Ok(pages)) => {
            info!(
                "Extracted text from {} page(s) of {}",
                pages.len(),
                path.display()
            );
            Ok(normalize_whitespace(&join_pages(&pages)))
        }
        Ok(Err(e)) => {
            error!("Error reading PDF file {}: {e}", path.display());
            Ok(RESUME_READ_ERROR.to_string())
        }
        Err(e) => {
            error!("PDF extraction aborted for {}: {e}", path.display());
            Ok(RESUME_READ_ERROR.to_string())
        }
    }
}

/// Concatenates pages in order, each non-empty page followed by a page break.
fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .filter(|p| !p.is_empty())
        .fold(String::new(), |mut acc, page| {
            acc.push_str(page);
            acc.push_str(PAGE_BREAK);
            acc
        })
}

/// Collapses any run of blank lines to a single blank line and any run of
/// horizontal whitespace to one space, then trims the result.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_blank = false;

    for line in text.split('\n') {
        let line = collapse_horizontal(line);
        if line.trim().is_empty() {
            pending_blank = true;
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if pending_blank {
                out.push('\n');
            }
        }
        pending_blank = false;
        out.push_str(&line);
    }

    out.trim().to_string()
}

fn collapse_horizontal(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_run = false;
    for c in line.chars() {
        if c.is_whitespace() {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}
