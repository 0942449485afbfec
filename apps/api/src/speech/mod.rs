//! Text-to-speech for assistant replies.
//!
//! `GoogleTts` uses the public Translate TTS endpoint: text is split into
//! short chunks, each chunk is fetched as MP3 and the segments are concatenated.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_TTS_ENDPOINT: &str = "https://translate.google.com/translate_tts";

/// Longest chunk the endpoint accepts.
const MAX_CHUNK_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Nothing to synthesize")]
    EmptyText,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TTS service returned status {status} for chunk {chunk}")]
    Api { status: u16, chunk: usize },
}

/// Renders text as MP3 audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Bytes, SpeechError>;
}

#[derive(Clone)]
pub struct GoogleTts {
    client: Client,
    endpoint: String,
    lang: String,
}

impl GoogleTts {
    pub fn new(endpoint: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            lang: lang.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str) -> Result<Bytes, SpeechError> {
        let chunks = split_into_chunks(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let total = chunks.len().to_string();
        let mut audio = BytesMut::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let idx_str = idx.to_string();
            let len_str = chunk.chars().count().to_string();
            let response = self
                .client
                .get(&self.endpoint)
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", self.lang.as_str()),
                    ("q", chunk.as_str()),
                    ("total", total.as_str()),
                    ("idx", idx_str.as_str()),
                    ("textlen", len_str.as_str()),
                ])
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(SpeechError::Api {
                    status: status.as_u16(),
                    chunk: idx,
                });
            }
            audio.extend_from_slice(&response.bytes().await?);
        }

        debug!(
            "Synthesized {} chunk(s) into {} bytes of audio",
            chunks.len(),
            audio.len()
        );
        Ok(audio.freeze())
    }
}

/// Splits `text` on whitespace into chunks of at most `max_chars` characters.
/// Words longer than `max_chars` are cut.
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(max_chars);
            chunks.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() { word.len() } else { word.len() + 1 };
        if current_len + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
