//! Error type shared by every storage module.
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Propagated filesystem failure (open, read, write, flush).
    Io(std::io::Error),
    /// On-disk state that doesn't decode into a valid header, node, or record:
    /// an unrecognized `node_type` byte, a slot index past `node_cnt`, a
    /// truncated value record.
    Corruption(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Corruption(msg) => write!(f, "corrupt storage: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

/// Builds an `Error` value inline, e.g. `err!(Corruption, "bad node type {}", b)`.
macro_rules! err {
    ($variant:ident, $($arg:tt)*) => {
        $crate::errors::Error::$variant(format!($($arg)*))
    };
}

pub(crate) use err;
