//! Structured error taxonomy for the TN3270 session core.
//!
//! Mirrors the shape of the error kinds a caller actually needs to branch
//! on — not every internal failure mode, just the stable, documented set.

use std::fmt;
use std::io;

/// Top-level error type for all session-core operations.
#[derive(Debug)]
pub enum Error {
    /// The underlying stream failed or timed out at the I/O layer.
    Io(io::Error),
    /// An operation that requires an active session was invoked after close.
    NotConnected,
    /// The peer rejected essential options, or the overall deadline expired
    /// with no usable mode reached.
    NegotiationFailure(NegotiationFailure),
    /// An invalid negotiation state transition was attempted.
    State(StateError),
    /// A malformed or unrecognised data-stream byte sequence.
    DataStream(DataStreamError),
    /// A write was attempted against a protected cell.
    ProtectedViolation { address: u16 },
    /// A caller-supplied deadline was reached.
    Timeout { deadline_ms: u64 },
}

#[derive(Debug)]
pub struct NegotiationFailure {
    pub reason: NegotiationFailureReason,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationFailureReason {
    /// Peer never offered a usable combination of BINARY/EOR/TTYPE.
    NoUsableMode,
    /// Peer offered TN3270E but the sub-negotiation never converged.
    Tn3270eStalled,
}

#[derive(Debug)]
pub struct StateError {
    pub from: &'static str,
    pub attempted: &'static str,
}

#[derive(Debug)]
pub enum DataStreamError {
    /// The stream ended in the middle of an order or command.
    Truncated { at: usize },
    /// An order or command byte outside the recognised set.
    Unknown { order_or_command: u8, context: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::NotConnected => write!(f, "operation requires an active session"),
            Error::NegotiationFailure(nf) => write!(
                f,
                "negotiation failed after {}ms: {}",
                nf.elapsed_ms,
                match nf.reason {
                    NegotiationFailureReason::NoUsableMode =>
                        "no usable mode (BINARY/EOR/TTYPE) reached",
                    NegotiationFailureReason::Tn3270eStalled =>
                        "TN3270E sub-negotiation stalled",
                }
            ),
            Error::State(e) => write!(
                f,
                "invalid negotiation transition: {} -> {}",
                e.from, e.attempted
            ),
            Error::DataStream(DataStreamError::Truncated { at }) => {
                write!(f, "data stream truncated at offset {at}")
            }
            Error::DataStream(DataStreamError::Unknown { order_or_command, context }) => {
                write!(f, "unknown byte 0x{order_or_command:02X} in {context}")
            }
            Error::ProtectedViolation { address } => {
                write!(f, "write to protected cell at address {address}")
            }
            Error::Timeout { deadline_ms } => {
                write!(f, "deadline of {deadline_ms}ms exceeded")
            }
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

impl From<StateError> for Error {
    fn from(e: StateError) -> Self {
        Error::State(e)
    }
}

impl From<DataStreamError> for Error {
    fn from(e: DataStreamError) -> Self {
        Error::DataStream(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_non_empty() {
        let errs = [
            Error::NotConnected,
            Error::State(StateError { from: "Closed", attempted: "TcpOpen" }),
            Error::DataStream(DataStreamError::Truncated { at: 12 }),
            Error::ProtectedViolation { address: 42 },
            Error::Timeout { deadline_ms: 2000 },
        ];
        for e in errs {
            assert!(!e.to_string().is_empty());
        }
    }

    #[test]
    fn io_error_converts() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
    }
}
