//! Control-plane error handling.
//!
//! Media-side errors live in [`crate::driver::Error`]; backend errors in
//! [`crate::backend::Error`]. The types here cover everything the
//! gateway exchanges with the PBX: REST requests and the event
//! WebSocket.

use async_tungstenite::tungstenite::{error::Error as TungsteniteError, protocol::CloseFrame};
use reqwest::StatusCode;
use serde_json::Error as JsonError;
use std::{error::Error as StdError, fmt};
use url::ParseError as UrlError;

/// Error raised when talking to the PBX control plane.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// An HTTP request could not be performed.
    Http(reqwest::Error),
    /// The PBX answered a REST request with an unexpected status.
    UnexpectedResponse {
        /// Which operation was attempted.
        endpoint: &'static str,
        /// The status it came back with.
        status: StatusCode,
    },
    /// A payload failed to serialize or deserialize.
    Json(JsonError),
    /// The event WebSocket failed at the transport level.
    Ws(TungsteniteError),
    /// The event WebSocket was closed by the PBX.
    WsClosed(Option<CloseFrame<'static>>),
    /// The event channel carries JSON text; binary frames are a
    /// protocol violation.
    UnexpectedBinaryMessage(Vec<u8>),
    /// The configured PBX URL could not be parsed or lacks a host.
    Url(UrlError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to talk to the PBX: ")?;
        match self {
            Error::Http(e) => write!(f, "http failure {}.", e),
            Error::UnexpectedResponse { endpoint, status } =>
                write!(f, "{} returned unexpected status {}.", endpoint, status),
            Error::Json(e) => write!(f, "json failure {}.", e),
            Error::Ws(e) => write!(f, "websocket failure {}.", e),
            Error::WsClosed(Some(frame)) =>
                write!(f, "event stream closed: {} {}.", frame.code, frame.reason),
            Error::WsClosed(None) => write!(f, "event stream closed."),
            Error::UnexpectedBinaryMessage(bytes) =>
                write!(f, "unexpected {}-byte binary event frame.", bytes.len()),
            Error::Url(e) => write!(f, "bad PBX url {}.", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Ws(e) => Some(e),
            Error::Url(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<JsonError> for Error {
    fn from(e: JsonError) -> Self {
        Error::Json(e)
    }
}

impl From<TungsteniteError> for Error {
    fn from(e: TungsteniteError) -> Self {
        Error::Ws(e)
    }
}

impl From<UrlError> for Error {
    fn from(e: UrlError) -> Self {
        Error::Url(e)
    }
}

/// Convenience type for control-plane results.
pub type Result<T> = std::result::Result<T, Error>;
