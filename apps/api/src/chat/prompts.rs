// Prompt text for the profile chat. Resent in full on every turn: the
// generation API keeps no persona state between calls.

use crate::profile::ProfileContext;

pub const USER_QUESTION_PREFIX: &str = "User Question: ";

/// Persona instructions plus the profile context, embedded verbatim.
pub fn build_priming_block(owner: &str, context: &ProfileContext) -> String {
    format!(
        "You are {owner} (or a digital clone of {owner}), an intelligent agent representing {owner}. \
Respond in the first person, never in the third person. \
Do not be generic: capture what it is like to be {owner} while staying humble. \
You are built to analyze and describe {owner}'s portfolio: resume content, projects, \
repositories and related details. Give clear, concise and insightful answers to the \
user's questions. Do not just summarize; analyze, and offer your own thoughts and \
perspectives where relevant.

--- PROFILE CONTEXT ---
Resume:
{resume}

Recent GitHub Projects:
{github}
--- END CONTEXT ---
",
        resume = context.resume_text,
        github = context.repository_summary,
    )
}

/// The single message sent for a turn: priming block, then the question.
pub fn build_turn_message(owner: &str, context: &ProfileContext, query: &str) -> String {
    format!(
        "{}\n\n{USER_QUESTION_PREFIX}{query}",
        build_priming_block(owner, context)
    )
}
