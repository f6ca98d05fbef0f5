// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;
use thiserror::Error;

/// Limits the protocol layer enforces while parsing. The engine re-checks
/// the value limit on store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolLimits {
    pub max_key_bytes: usize,
    pub max_value_bytes: usize,
}

impl Default for ProtocolLimits {
    fn default() -> Self {
        Self {
            max_key_bytes: 250,
            max_value_bytes: 102_400,
        }
    }
}

/// Classification of a rejected record; drives the wire response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Verb not recognized. Answered with bare `ERROR`.
    UnknownCommand,
    InvalidKey,
    InvalidParameter,
    MissingParameter,
    InvalidData,
    ProtocolViolation,
    /// Limit failures that are the server's to report (`SERVER_ERROR`).
    ServerError,
}

/// One validated client command, or the classified reason it was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get {
        keys: Vec<Bytes>,
    },
    Set {
        key: Bytes,
        flags: u32,
        /// Accepted from the wire and validated; the engine applies the
        /// uniform default TTL regardless.
        expiration: u32,
        data: Bytes,
        no_reply: bool,
    },
    Delete {
        key: Bytes,
        no_reply: bool,
    },
    Invalid {
        kind: ErrorKind,
        message: String,
    },
}

impl Command {
    pub fn invalid(kind: ErrorKind, message: impl Into<String>) -> Self {
        Command::Invalid {
            kind,
            message: message.into(),
        }
    }
}

/// A key-syntax rule violation. The display strings are the wire messages.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum KeyError {
    #[error("key cannot be empty")]
    Empty,
    #[error("key cannot be whitespace only")]
    WhitespaceOnly,
    #[error("key too long (max {0} bytes)")]
    TooLong(usize),
    #[error("key contains spaces")]
    ContainsSpaces,
    #[error("key contains control characters")]
    ContainsControl,
}

/// Checks the key rules: non-empty, within `max_key_bytes`, no ASCII
/// whitespace, no control bytes (< 0x20 or 0x7F).
pub fn validate_key(key: &[u8], max_key_bytes: usize) -> Result<(), KeyError> {
    if key.is_empty() {
        return Err(KeyError::Empty);
    }
    if key.iter().all(u8::is_ascii_whitespace) {
        return Err(KeyError::WhitespaceOnly);
    }
    if key.len() > max_key_bytes {
        return Err(KeyError::TooLong(max_key_bytes));
    }
    if key.iter().any(u8::is_ascii_whitespace) {
        return Err(KeyError::ContainsSpaces);
    }
    if key.iter().any(|b| *b < 0x20 || *b == 0x7f) {
        return Err(KeyError::ContainsControl);
    }
    Ok(())
}
