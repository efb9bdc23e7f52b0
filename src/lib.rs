#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
//! Myna is an async voice-bot media gateway for Asterisk, written in Rust.
//! It connects a PBX to pluggable speech backends and speaks with callers
//! in real time. The library offers:
//!  * A control-plane adapter consuming Stasis events over the Asterisk
//!  REST Interface (ARI) WebSocket, answering calls and bridging them to
//!  an External Media RTP endpoint.
//!  * A per-call media driver: a UDP/RTP endpoint which yields inbound
//!  G.711 µ-law audio and streams synthesized replies back at a fixed
//!  frame cadence, with queueing and immediate cancellation.
//!  * Voice-activity detection which cuts the inbound stream into
//!  utterances and fires barge-in when the caller talks over the bot.
//!  * Abstract [`Recognizer`], [`Synthesizer`] and [`LanguageModel`]
//!  contracts, so any speech or language provider can be plugged in.
//!
//! ## A call, end to end
//! `StasisStart` arrives on the event stream; [`Myna`] answers the
//! channel, creates an External Media channel towards the local RTP
//! endpoint and bridges the two. The per-call [`Call`] orchestrator then
//! buffers caller speech, transcribes each utterance, asks the language
//! model for a reply, splits it into sentences and synthesizes them onto
//! the playback queue. If the caller starts speaking during playback, the
//! queue is dropped and the stream stops within one frame duration.
//!
//! [`Recognizer`]: crate::backend::Recognizer
//! [`Synthesizer`]: crate::backend::Synthesizer
//! [`LanguageModel`]: crate::backend::LanguageModel
//! [`Myna`]: crate::Myna
//! [`Call`]: crate::Call

#![warn(clippy::pedantic, rust_2018_idioms)]
#![allow(
    // Allowed as they are too pedantic
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::too_many_lines,
    clippy::cast_lossless,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
)]

pub mod audio;
pub mod backend;
mod call;
mod client;
mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod events;
mod manager;
pub mod split;
#[cfg(test)]
pub(crate) mod test_impls;
pub mod vad;
pub mod ws;

pub use crate::{
    call::{Call, ResponseChunk},
    client::AriClient,
    config::Config,
    driver::MediaEndpoint,
    manager::Myna,
    ws::EventStream,
};
