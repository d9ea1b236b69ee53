//! Shared error type across chatstorm crates.

use std::io;

use thiserror::Error;

/// Stable error classification used in reports and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Dialing the target failed.
    ConnectFailed,
    /// Frame body is not valid JSON (recoverable).
    FrameDecode,
    /// Frame header is not a valid length (fatal for the connection).
    Framing,
    /// Peer reset or truncated the stream.
    ConnectionLost,
    /// Body cannot be represented by the active wire variant.
    FrameTooLarge,
    /// Configuration rejected by validation.
    InvalidConfig,
    /// Unsupported configuration version.
    UnsupportedVersion,
    /// Anything else.
    Unexpected,
}

impl ErrorKind {
    /// String representation used in logs and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ConnectFailed => "CONNECT_FAILED",
            ErrorKind::FrameDecode => "FRAME_DECODE",
            ErrorKind::Framing => "FRAMING",
            ErrorKind::ConnectionLost => "CONNECTION_LOST",
            ErrorKind::FrameTooLarge => "FRAME_TOO_LARGE",
            ErrorKind::InvalidConfig => "INVALID_CONFIG",
            ErrorKind::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorKind::Unexpected => "UNEXPECTED",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Unified error type used by core and harness.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("frame decode failed: {0}")]
    FrameDecode(String),
    #[error("framing error: {0}")]
    Framing(String),
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl HarnessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarnessError::ConnectFailed(_) => ErrorKind::ConnectFailed,
            HarnessError::FrameDecode(_) => ErrorKind::FrameDecode,
            HarnessError::Framing(_) => ErrorKind::Framing,
            HarnessError::ConnectionLost(_) => ErrorKind::ConnectionLost,
            HarnessError::FrameTooLarge { .. } => ErrorKind::FrameTooLarge,
            HarnessError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            HarnessError::UnsupportedVersion => ErrorKind::UnsupportedVersion,
            HarnessError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// True for conditions that end a session.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, HarnessError::FrameDecode(_))
    }

    /// Classify a stream I/O failure: a vanished peer is `ConnectionLost`,
    /// everything else is `Unexpected`.
    pub fn from_io(context: &str, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => {
                HarnessError::ConnectionLost(format!("{context}: {e}"))
            }
            _ => HarnessError::Unexpected(format!("{context}: {e}")),
        }
    }
}
