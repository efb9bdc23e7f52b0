//! Channel state carried inside Stasis events.

use serde::Deserialize;

/// A PBX channel as described by the control plane.
#[derive(Clone, Debug, Deserialize)]
pub struct Channel {
    /// Unique channel identifier; also the registry key for its call.
    pub id: String,
    /// Technology-qualified channel name, e.g. `PJSIP/101-00000006`.
    pub name: String,
    /// Current channel state.
    pub state: ChannelState,
    /// Transport-level session identifier. Absent on some PBX builds.
    #[serde(default)]
    pub protocol_id: String,
    /// Identity of the calling party.
    pub caller: Caller,
    /// Dialplan location the channel came from.
    pub dialplan: Dialplan,
    /// Language configured for the channel.
    pub language: String,
}

/// Channel state as reported by the PBX.
///
/// Anything other than the two states the gateway cares about degrades
/// to [`ChannelState::Unknown`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
pub enum ChannelState {
    /// The channel is answered and passing media.
    Up,
    /// The channel is ringing.
    Ring,
    /// Any other state.
    #[serde(other)]
    Unknown,
}

/// Calling-party identity.
#[derive(Clone, Debug, Deserialize)]
pub struct Caller {
    /// Caller id name; often empty.
    pub name: String,
    /// Caller id number. Calls without one are not serviced.
    pub number: String,
}

/// Dialplan position of a channel.
#[derive(Clone, Debug, Deserialize)]
pub struct Dialplan {
    /// Dialplan context.
    pub context: String,
    /// Dialplan extension.
    pub exten: String,
    /// Dialplan priority.
    pub priority: i64,
    /// Name of the application currently executing.
    pub app_name: String,
    /// Argument string of that application.
    pub app_data: String,
}
