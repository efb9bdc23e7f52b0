//! Canned backend implementations for in-crate tests.

use crate::backend::{Error, LanguageModel, Recognizer, Result, Synthesizer};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Recognizer returning the same transcription for every utterance.
pub struct StaticRecognizer {
    text: Option<String>,
}

impl StaticRecognizer {
    pub fn hearing(text: &str) -> Self {
        Self {
            text: Some(text.to_owned()),
        }
    }

    pub fn hearing_nothing() -> Self {
        Self { text: None }
    }
}

#[async_trait]
impl Recognizer for StaticRecognizer {
    async fn recognize(&self, _ulaw: &[u8]) -> Result<Option<String>> {
        Ok(self.text.clone())
    }
}

/// Recognizer whose first invocation errors; later ones transcribe.
pub struct FlakyRecognizer {
    text: String,
    calls: AtomicUsize,
}

impl FlakyRecognizer {
    pub fn failing_once_then(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Recognizer for FlakyRecognizer {
    async fn recognize(&self, _ulaw: &[u8]) -> Result<Option<String>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(Error::new("transcription backend exploded"))
        } else {
            Ok(Some(self.text.clone()))
        }
    }
}

/// Language model with a single canned reply.
pub struct StaticLanguageModel {
    reply: String,
}

impl StaticLanguageModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_owned(),
        }
    }
}

#[async_trait]
impl LanguageModel for StaticLanguageModel {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(self.reply.clone())
    }
}

/// Synthesizer emitting a recognisable byte pattern of fixed length.
pub struct StaticSynthesizer {
    byte: u8,
    len: usize,
}

impl StaticSynthesizer {
    pub fn pattern(byte: u8, len: usize) -> Self {
        Self { byte, len }
    }
}

#[async_trait]
impl Synthesizer for StaticSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        Ok(vec![self.byte; self.len])
    }
}

/// Synthesizer whose audio is the first byte of the text, repeated, so
/// wire captures reveal which sentence each stream came from.
pub struct EchoSynthesizer {
    len: usize,
}

impl EchoSynthesizer {
    pub fn frames(len: usize) -> Self {
        Self { len }
    }
}

#[async_trait]
impl Synthesizer for EchoSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let byte = *text.as_bytes().first().unwrap_or(&0);
        Ok(vec![byte; self.len])
    }
}
