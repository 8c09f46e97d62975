//! Link setup errors.

use std::fmt;
use std::io;

use crate::link::LinkId;

/// Why a link could not be brought up.
#[derive(Debug)]
pub enum Error {
    /// Opening or duplicating the serial device failed.
    Io(io::Error),
    /// A configuration value is out of range or unparsable.
    InvalidConfig { key: String, value: String },
    /// The registry already holds a link with this id.
    AlreadyInitialized(LinkId),
    /// A link thread could not be started.
    Spawn(io::Error),
}

impl Error {
    /// Negated errno view of the error, for callers that report status codes.
    pub fn status(&self) -> i32 {
        match self {
            Error::Io(e) | Error::Spawn(e) => -e.raw_os_error().unwrap_or(libc::EIO),
            Error::InvalidConfig { .. } => -libc::EINVAL,
            Error::AlreadyInitialized(_) => -libc::EEXIST,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "serial I/O error: {}", e),
            Error::InvalidConfig { key, value } => {
                write!(f, "invalid value for '{}': '{}'", key, value)
            }
            Error::AlreadyInitialized(id) => write!(f, "link {} is already initialized", id.0),
            Error::Spawn(e) => write!(f, "failed to start link thread: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) | Error::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
