//! Media-endpoint error handling.

use std::{error::Error as StdError, fmt, io::Error as IoError};

/// Errors encountered while binding or operating a media endpoint.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The underlying UDP socket failed to bind or reported an
    /// unrecoverable error.
    Io(IoError),
    /// The requested receive size cannot hold an RTP header.
    PacketSizeTooSmall(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to operate media endpoint: ")?;
        match self {
            Error::Io(e) => write!(f, "i/o failure {}.", e),
            Error::PacketSizeTooSmall(size) => write!(
                f,
                "packet size {} cannot hold a 12-byte RTP header.",
                size
            ),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::PacketSizeTooSmall(_) => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

/// Convenience type for endpoint operations.
pub type Result<T> = std::result::Result<T, Error>;
