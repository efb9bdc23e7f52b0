//! Typed envelopes for the Stasis control-plane events.
//!
//! Events arrive as JSON over the ARI WebSocket. Only the Stasis
//! lifecycle pair is interpreted; every other `type` value degrades to
//! [`AriEvent::Unknown`] and is ignored by the adapter.

mod channel;

pub use channel::{Caller, Channel, ChannelState, Dialplan};

use serde::Deserialize;

/// One control-plane event from the PBX.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type")]
#[non_exhaustive]
pub enum AriEvent {
    /// A channel has entered the Stasis application: a call for us.
    StasisStart {
        /// Event creation time, as reported by the PBX.
        timestamp: String,
        /// The channel entering the application.
        channel: Channel,
        /// Identifier of the Asterisk instance which raised the event.
        asterisk_id: String,
        /// Name of the Stasis application.
        application: String,
    },
    /// A channel has left the Stasis application: the call is over.
    StasisEnd {
        /// Event creation time, as reported by the PBX.
        timestamp: String,
        /// The channel leaving the application.
        channel: Channel,
        /// Identifier of the Asterisk instance which raised the event.
        asterisk_id: String,
        /// Name of the Stasis application.
        application: String,
    },
    /// Any event type this gateway does not act on.
    #[serde(other)]
    Unknown,
}
