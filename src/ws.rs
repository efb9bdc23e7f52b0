//! The ARI event WebSocket.
//!
//! Connecting to `/ari/events` registers the Stasis application with the
//! PBX and yields the JSON event stream which drives call lifecycle.

use crate::{
    config::Config,
    error::{Error, Result},
    events::AriEvent,
};
use async_tungstenite::{
    tokio::{connect_async, ConnectStream},
    tungstenite::Message,
    WebSocketStream,
};
use futures::StreamExt;
use tracing::{debug, instrument, trace};
use url::Url;

type WsStream = WebSocketStream<ConnectStream>;

/// A connected ARI event stream.
pub struct EventStream {
    stream: WsStream,
}

/// Derives the WebSocket events URL from the configured REST base URL.
fn events_url(config: &Config) -> Result<Url> {
    let base = Url::parse(&config.ast_url)?;
    let scheme = if base.scheme() == "https" { "wss" } else { "ws" };
    let host = base.host_str().ok_or(Error::Url(url::ParseError::EmptyHost))?;
    let port = base.port().unwrap_or(8088);

    let mut url = Url::parse(&format!("{}://{}:{}/ari/events", scheme, host, port))?;
    url.query_pairs_mut()
        .append_pair("app", &config.ast_app)
        .append_pair("api_key", &format!("{}:{}", config.ast_user, config.ast_pass))
        .append_pair("subscribeAll", "true");

    Ok(url)
}

/// Connects to the PBX and registers the configured application.
#[instrument(skip(config), fields(app = %config.ast_app))]
pub async fn connect(config: &Config) -> Result<EventStream> {
    let url = events_url(config)?;
    let (stream, _) = connect_async(url.as_str()).await?;
    trace!("Event WebSocket connected.");

    Ok(EventStream { stream })
}

impl EventStream {
    /// Waits for the next event.
    ///
    /// Malformed event JSON is logged and skipped rather than surfaced;
    /// transport failures and stream closure end the stream with an
    /// error, and reconnection policy is left to the caller.
    pub async fn recv(&mut self) -> Result<AriEvent> {
        loop {
            match self.stream.next().await {
                Some(Ok(message)) =>
                    if let Some(event) = convert_ws_message(message)? {
                        return Ok(event);
                    },
                Some(Err(e)) => return Err(e.into()),
                None => return Err(Error::WsClosed(None)),
            }
        }
    }
}

fn convert_ws_message(message: Message) -> Result<Option<AriEvent>> {
    Ok(match message {
        Message::Text(payload) => serde_json::from_str(&payload)
            .map_err(|e| {
                debug!("Unexpected event JSON {:?}: {}.", payload, e);
                e
            })
            .ok(),
        Message::Binary(bytes) => {
            return Err(Error::UnexpectedBinaryMessage(bytes));
        },
        Message::Close(frame) => {
            return Err(Error::WsClosed(frame));
        },
        // Ping/Pong message behaviour is internally handled by tungstenite.
        _ => None,
    })
}
