// Conversation log, persona prompt and response generation.
// All model calls go through llm_client.

pub mod generator;
pub mod log;
pub mod prompts;
