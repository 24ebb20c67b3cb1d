// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

/// Error taxonomy for the record protocol and its endpoints.
///
/// The kinds matter more than the messages: callers decide whether to
/// retry, resynchronise or abort based on the variant alone.
#[derive(Debug, Error)]
pub enum HoraceError {
    /// The octet stream ended cleanly on a record boundary.
    #[error("end of stream")]
    EndOfStream,

    /// Premature end of stream, integer overflow, out-of-range content,
    /// or a length mismatch while decoding.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// Out-of-order session start, mismatched ack, duplicate or missing
    /// required attribute.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A write failed but may succeed if retried.
    #[error("transient endpoint failure: {0}")]
    Transient(String),

    /// Store locked, filesystem denied, unrecoverable endpoint failure.
    #[error("fatal endpoint failure: {0}")]
    Fatal(String),

    /// File-number overflow, inconsistent spool padding, exhausted buffer.
    #[error("resource exhausted: {0}")]
    Exhausted(String),

    /// The endpoint lacks the requested capability.
    #[error("endpoint does not support {0}")]
    Unsupported(&'static str),

    /// Cooperative cancellation; unwinds silently to the task root.
    #[error("terminated")]
    Terminate,
}

impl HoraceError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn exhausted(msg: impl Into<String>) -> Self {
        Self::Exhausted(msg.into())
    }

    /// True if a retry of the failed operation could make progress.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<std::io::Error> for HoraceError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                Self::Malformed("unexpected end of stream".to_string())
            },
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::WouldBlock => Self::Transient(e.to_string()),
            _ => Self::Fatal(e.to_string()),
        }
    }
}

/// Message carried by the malformed-input error raised when an octet
/// stream ends inside a record frame. A spool reader distinguishes this
/// from in-frame corruption: a truncated tail can be checkpointed away,
/// corrupt bytes cannot.
pub const TRUNCATED_FRAME: &str = "record truncated mid-frame";

impl HoraceError {
    /// True if this error reports a record frame cut short by the end
    /// of the stream.
    pub fn is_truncated_frame(&self) -> bool {
        matches!(self, Self::Malformed(msg) if msg == TRUNCATED_FRAME)
    }
}

pub type Result<T, E = HoraceError> = std::result::Result<T, E>;
