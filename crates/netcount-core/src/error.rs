//! Error types for interface-table parsing and acquisition.

use std::fmt;

/// Why a record buffer could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Fewer bytes remain than the fixed record prefix (length + kind).
    TruncatedHeader { remaining: usize },
    /// A record declares a length of zero and would never advance the cursor.
    ZeroLength,
    /// The declared record length runs past the end of the buffer.
    Overrun { declared: usize, remaining: usize },
    /// An interface-info record is too short to hold its header and
    /// link-layer prefix.
    ShortRecord { declared: usize, required: usize },
    /// The interface name span runs past the end of its record.
    NameOverrun { name_len: usize, available: usize },
}

/// A malformed record, located by its byte offset in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError {
    pub offset: usize,
    pub kind: ParseErrorKind,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed interface record at offset {}: ", self.offset)?;
        match self.kind {
            ParseErrorKind::TruncatedHeader { remaining } => {
                write!(f, "only {remaining} byte(s) left for the record header")
            }
            ParseErrorKind::ZeroLength => write!(f, "record declares zero length"),
            ParseErrorKind::Overrun {
                declared,
                remaining,
            } => write!(
                f,
                "declared length {declared} exceeds the {remaining} byte(s) left in the buffer"
            ),
            ParseErrorKind::ShortRecord { declared, required } => write!(
                f,
                "interface record of {declared} byte(s) is shorter than the {required} required"
            ),
            ParseErrorKind::NameOverrun {
                name_len,
                available,
            } => write!(
                f,
                "interface name of {name_len} byte(s) exceeds the {available} left in the record"
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors surfaced by the core to the polling loop.
#[derive(Debug)]
pub enum Error {
    /// The interface-table buffer is malformed; this cycle's parse is abandoned.
    Parse(ParseError),
    /// The interface table could not be acquired.
    Io(std::io::Error),
    /// No interface-table source exists for this platform.
    Unsupported(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "interface table unavailable: {e}"),
            Self::Unsupported(what) => write!(f, "{what} is not supported on this platform"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Unsupported(_) => None,
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl Error {
    /// Whether this error only invalidates the current cycle's buffer.
    ///
    /// Malformed buffers are expected to be transient; acquisition failures are not.
    pub fn is_malformed_buffer(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrun_message_names_lengths() {
        let e = ParseError {
            offset: 112,
            kind: ParseErrorKind::Overrun {
                declared: 200,
                remaining: 40,
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("offset 112"));
        assert!(msg.contains("200"));
        assert!(msg.contains("40"));
    }

    #[test]
    fn parse_errors_are_malformed_buffers() {
        let e: Error = ParseError {
            offset: 0,
            kind: ParseErrorKind::ZeroLength,
        }
        .into();
        assert!(e.is_malformed_buffer());
        let io: Error = std::io::Error::other("sysctl failed").into();
        assert!(!io.is_malformed_buffer());
        assert!(io.to_string().contains("sysctl failed"));
    }
}
