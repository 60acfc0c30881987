use core::fmt;
use std::io;

/// All possible errors emitted by the image accessor
#[derive(Debug)]
pub enum Error {
    /// Underlying resource error
    Io(io::Error),

    /// Page number or position out of bound
    OutOfBounds,

    /// Buffer of the wrong length passed
    InvalidLength { expected: usize, actual: usize },

    /// Field cannot be written for this header layout
    NotImplemented(&'static str),

    /// Address not aligned
    NotAligned,

    /// Invalid value passed
    Value,
}

pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "i/o error: {e}"),
            Error::OutOfBounds => f.write_str("page number or offset out of range"),
            Error::InvalidLength { expected, actual } => {
                write!(f, "invalid buffer length {actual}, expected {expected}")
            }
            Error::NotImplemented(what) => write!(f, "{what} can't be set yet"),
            Error::NotAligned => f.write_str("address not aligned"),
            Error::Value => f.write_str("invalid value"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}
