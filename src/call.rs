//! Per-call orchestration: utterances in, spoken replies out.
//!
//! One [`Call`] runs the whole conversation for a single channel. Its
//! ingress loop feeds the voice-activity detector; each finished
//! utterance is pushed through recognition, the language model and the
//! sentence splitter, and the resulting chunks queue up for synthesis
//! and playback. Barge-in empties that queue and silences the endpoint
//! under the same lock, so no stale audio can slip onto the wire after
//! the caller starts talking.

use crate::{
    backend::{self, LanguageModel, Recognizer, Synthesizer},
    config::Config,
    constants::*,
    driver::MediaEndpoint,
    split::split_sentences,
    vad::{VadEvent, VoiceDetector},
};
use std::{collections::VecDeque, future::Future, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    select,
    sync::{Mutex, Notify},
    task::JoinSet,
    time::timeout,
};
use tracing::{debug, error, info, instrument, warn};

/// One sentence-sized slice of a reply, waiting to be synthesized and
/// played towards `peer`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResponseChunk {
    /// Text to synthesize.
    pub text: String,
    /// RTP address the audio should be sent to.
    pub peer: SocketAddr,
}

/// FIFO of response chunks pending synthesis.
///
/// The inner mutex doubles as the per-call lock ordering playback
/// submission against barge-in: the feeder holds it across one chunk's
/// synthesis and enqueue, barge-in holds it while clearing the queue and
/// cancelling the endpoint.
#[derive(Debug, Default)]
struct ChunkQueue {
    chunks: Mutex<VecDeque<ResponseChunk>>,
    notify: Notify,
}

impl ChunkQueue {
    async fn push(&self, chunk: ResponseChunk) {
        self.chunks.lock().await.push_back(chunk);
        self.notify.notify_one();
    }
}

/// Orchestrator for a single call.
pub struct Call {
    endpoint: MediaEndpoint,
    recognizer: Arc<dyn Recognizer>,
    synthesizer: Arc<dyn Synthesizer>,
    language_model: Arc<dyn LanguageModel>,
    rms_threshold: f32,
    speech_frames_threshold: usize,
    silence_frames_threshold: usize,
    backend_timeout: Option<Duration>,
}

impl Call {
    /// Creates an orchestrator over a bound endpoint with default
    /// thresholds and a 30-second backend timeout.
    #[must_use]
    pub fn new(
        endpoint: MediaEndpoint,
        recognizer: Arc<dyn Recognizer>,
        synthesizer: Arc<dyn Synthesizer>,
        language_model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            endpoint,
            recognizer,
            synthesizer,
            language_model,
            rms_threshold: SILENCE_RMS_THRESHOLD,
            speech_frames_threshold: SPEECH_FRAMES_THRESHOLD,
            silence_frames_threshold: SILENCE_FRAMES_THRESHOLD,
            backend_timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Creates an orchestrator taking thresholds and the backend timeout
    /// from `config`.
    #[must_use]
    pub fn from_config(
        endpoint: MediaEndpoint,
        recognizer: Arc<dyn Recognizer>,
        synthesizer: Arc<dyn Synthesizer>,
        language_model: Arc<dyn LanguageModel>,
        config: &Config,
    ) -> Self {
        Self {
            rms_threshold: config.rms_threshold,
            speech_frames_threshold: config.speech_frames_threshold,
            silence_frames_threshold: config.silence_frames_threshold,
            backend_timeout: config.backend_timeout,
            ..Self::new(endpoint, recognizer, synthesizer, language_model)
        }
    }

    /// Runs the call until its media stream ends or the task is
    /// cancelled.
    ///
    /// Every failure short of losing the socket is contained here: a
    /// backend that errors or times out costs one reply, never the call.
    /// Dropping the returned future (e.g. by aborting its task) tears
    /// down the endpoint, the playback worker and all in-flight
    /// recognition pipelines.
    #[instrument(skip(self), fields(endpoint = %self.endpoint.local_addr()))]
    pub async fn run(self) {
        let mut ingress = match self.endpoint.ingress(DEFAULT_PACKET_SIZE) {
            Ok(ingress) => ingress,
            Err(e) => {
                error!("Failed to open media ingress: {}.", e);
                return;
            },
        };

        let queue = Arc::new(ChunkQueue::default());
        let mut vad = VoiceDetector::new(
            self.rms_threshold,
            self.speech_frames_threshold,
            self.silence_frames_threshold,
        );
        let mut pipelines = JoinSet::new();

        info!("Call media loop started.");

        let ingress_loop = async {
            while let Some((frame, peer)) = ingress.next().await {
                match vad.push(&frame) {
                    Some(VadEvent::BargeIn) => {
                        info!("Speech detected, interrupting playback.");
                        let mut chunks = queue.chunks.lock().await;
                        chunks.clear();
                        self.endpoint.cancel_playback();
                    },
                    Some(VadEvent::Utterance(utterance)) => {
                        info!(
                            "Utterance finished: {} bytes ({:.2}s).",
                            utterance.len(),
                            utterance.len() as f32 / SAMPLE_RATE_RAW as f32
                        );
                        pipelines.spawn(respond(
                            utterance,
                            peer,
                            Arc::clone(&self.recognizer),
                            Arc::clone(&self.language_model),
                            Arc::clone(&queue),
                            self.backend_timeout,
                        ));
                    },
                    None => {},
                }
            }
        };

        let feeder_loop = feeder(
            &queue,
            &self.endpoint,
            &self.synthesizer,
            self.backend_timeout,
        );

        // The feeder never returns on its own; the call ends with its
        // media stream.
        select! {
            _ = ingress_loop => {},
            _ = feeder_loop => {},
        }

        info!("Call media loop finished.");
    }
}

/// Recognition pipeline for one utterance: transcribe, ask the language
/// model, split the reply and queue its chunks.
///
/// Any failure or timeout skips the response; the call stays up.
async fn respond(
    utterance: Vec<u8>,
    peer: SocketAddr,
    recognizer: Arc<dyn Recognizer>,
    language_model: Arc<dyn LanguageModel>,
    queue: Arc<ChunkQueue>,
    limit: Option<Duration>,
) {
    let text = match bounded(limit, recognizer.recognize(&utterance)).await {
        Ok(Some(text)) if !text.is_empty() => text,
        Ok(_) => {
            debug!("No confident transcription, skipping.");
            return;
        },
        Err(e) => {
            warn!("Recognition failed: {}.", e);
            return;
        },
    };
    info!("Recognized text: {}", text);

    let reply = match bounded(limit, language_model.generate(&text)).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Language model failed: {}.", e);
            return;
        },
    };
    info!("Reply text: {}", reply);

    for sentence in split_sentences(&reply) {
        queue.push(ResponseChunk { text: sentence, peer }).await;
    }
}

/// Pops chunks off the queue, synthesizes them and hands the audio to
/// the endpoint, holding the queue lock for the whole of each chunk.
///
/// The very first playback of the call is preceded by 800 ms of µ-law
/// silence so the remote receiver can settle its buffers.
async fn feeder(
    queue: &ChunkQueue,
    endpoint: &MediaEndpoint,
    synthesizer: &Arc<dyn Synthesizer>,
    limit: Option<Duration>,
) {
    let mut prefilled = false;

    loop {
        let waiter = queue.notify.notified();
        let mut chunks = queue.chunks.lock().await;

        let chunk = match chunks.pop_front() {
            Some(chunk) => chunk,
            None => {
                drop(chunks);
                waiter.await;
                continue;
            },
        };

        debug!("Synthesizing response chunk: {}", chunk.text);
        match bounded(limit, synthesizer.synthesize(&chunk.text)).await {
            Ok(audio) => {
                let audio = if prefilled {
                    audio
                } else {
                    prefilled = true;
                    let mut padded =
                        Vec::with_capacity(PREFILL_FRAMES * ULAW_FRAME_SIZE + audio.len());
                    padded.resize(PREFILL_FRAMES * ULAW_FRAME_SIZE, SILENT_ULAW);
                    padded.extend_from_slice(&audio);
                    padded
                };
                endpoint.enqueue_playback(audio, chunk.peer, SAMPLE_RATE_RAW, TIMESTEP_LENGTH);
            },
            Err(e) => warn!("Synthesis failed: {}.", e),
        }
        // The queue guard is released only here, after the enqueue, so a
        // concurrent barge-in always sees the chunk either queued or
        // cancellable.
    }
}

async fn bounded<T, F>(limit: Option<Duration>, fut: F) -> backend::Result<T>
where
    F: Future<Output = backend::Result<T>>,
{
    match limit {
        Some(limit) => match timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(backend::Error::new("backend call timed out")),
        },
        None => fut.await,
    }
}
