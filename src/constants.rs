//! Constants affecting media handling and voice-activity detection.

use discortp::rtp::RtpType;
use std::time::Duration;

/// Sample rate of audio exchanged with the PBX.
pub const SAMPLE_RATE_RAW: usize = 8_000;

/// Number of audio frames/packets to be sent per second.
pub const AUDIO_FRAME_RATE: usize = 50;

/// Length of time between any two audio frames.
pub const TIMESTEP_LENGTH: Duration = Duration::from_millis(1000 / AUDIO_FRAME_RATE as u64);

/// Length (in milliseconds) of any audio frame.
pub const FRAME_LEN_MS: usize = 1000 / AUDIO_FRAME_RATE;

/// Number of bytes in one complete frame of 8 kHz µ-law audio.
///
/// µ-law stores one sample per byte, so this is equally the number of
/// samples per frame.
pub const ULAW_FRAME_SIZE: usize = SAMPLE_RATE_RAW / AUDIO_FRAME_RATE;

/// µ-law encoding of a zero-amplitude sample.
///
/// A frame filled with this byte is digital silence.
pub const SILENT_ULAW: u8 = 0xFF;

/// Number of silent frames prepended to the first playback of a call,
/// giving the remote RTP receiver time to initialize its buffers.
pub const PREFILL_FRAMES: usize = 40;

/// RMS amplitude below which a frame is classified as silence.
pub const SILENCE_RMS_THRESHOLD: f32 = 30.0;

/// Consecutive speech frames after which the caller counts as talking,
/// triggering barge-in.
pub const SPEECH_FRAMES_THRESHOLD: usize = 10;

/// Consecutive silence frames which terminate an utterance.
pub const SILENCE_FRAMES_THRESHOLD: usize = 20;

/// Default receive size for inbound RTP datagrams.
pub const DEFAULT_PACKET_SIZE: usize = 2048;

/// Number of bytes in an RTP header without extensions or CSRCs.
pub const RTP_HEADER_LEN: usize = 12;

/// The one (and only) RTP version.
pub const RTP_VERSION: u8 = 2;

/// Profile type used by G.711 µ-law audio traffic.
pub const RTP_PROFILE_TYPE: RtpType = RtpType::Pcmu;
