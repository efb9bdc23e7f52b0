//! Abstract speech and language backends.
//!
//! The gateway core never talks to a concrete recognition, synthesis or
//! language-model provider. Implementations live outside the crate and
//! plug in through the three traits here; any provider honoring the
//! contracts is admissible. Backends are shared immutably across calls
//! (`Arc<dyn ...>`), so implementations must either be stateless per
//! invocation or serialize internally.

use async_trait::async_trait;
use std::{error::Error as StdError, fmt};

/// Opaque error raised by a backend implementation.
///
/// The orchestrator treats every backend error the same way: the
/// affected utterance is skipped and the call stays up, so nothing more
/// structured than a boxed source is needed.
#[derive(Debug)]
pub struct Error(Box<dyn StdError + Send + Sync>);

impl Error {
    /// Wraps any error value.
    pub fn new<E>(source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self(source.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backend failure: {}", self.0)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.0)
    }
}

/// Convenience type for backend call results.
pub type Result<T> = std::result::Result<T, Error>;

/// Speech-to-text over a complete utterance.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Transcribes an utterance of 8 kHz µ-law audio.
    ///
    /// Returns `None` (or an empty string) when no confident
    /// transcription exists; the orchestrator treats both alike.
    async fn recognize(&self, ulaw: &[u8]) -> Result<Option<String>>;
}

/// Text-to-speech producing PBX-ready audio.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesizes `text` to 8 kHz mono µ-law audio.
    ///
    /// Latency is variable; the contract delivers the complete buffer.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Conversational language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Produces a plain-text reply for `prompt`. May block for seconds.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
