//! Text codec for binary engine exports.
//!
//! Bytes are written as decimal values joined by `,` (`83,81,76,...`).
//! Inefficient, but any string-only host store can hold it.

use std::error::Error;
use std::fmt::{Display, Formatter};

const SEPARATOR: char = ',';

/// Persisted snapshot text cannot be turned back into engine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Stored value is empty or whitespace.
    Empty,
    /// Token at `position` is not a decimal byte value.
    InvalidByte { position: usize, token: String },
    /// Decoded bytes were rejected by the engine loader.
    Engine(String),
    /// The image loaded but its rows do not read back as canteen data.
    UnreadableRows(String),
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "snapshot is empty"),
            Self::InvalidByte { position, token } => {
                write!(f, "snapshot token {position} is not a byte value: `{token}`")
            }
            Self::Engine(message) => write!(f, "snapshot rejected by engine: {message}"),
            Self::UnreadableRows(message) => write!(f, "snapshot rows are unreadable: {message}"),
        }
    }
}

impl Error for DecodeError {}

/// Encodes an engine export for the host store.
pub fn encode_snapshot(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 4);
    for (index, byte) in bytes.iter().enumerate() {
        if index > 0 {
            encoded.push(SEPARATOR);
        }
        encoded.push_str(&byte.to_string());
    }
    encoded
}

/// Decodes host-store text back into the engine export.
pub fn decode_snapshot(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    let trimmed = encoded.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::Empty);
    }

    trimmed
        .split(SEPARATOR)
        .enumerate()
        .map(|(position, token)| {
            token
                .trim()
                .parse::<u8>()
                .map_err(|_| DecodeError::InvalidByte {
                    position,
                    token: truncate_token(token),
                })
        })
        .collect()
}

fn truncate_token(token: &str) -> String {
    const MAX_TOKEN_CHARS: usize = 16;
    let mut truncated = token.chars().take(MAX_TOKEN_CHARS).collect::<String>();
    if token.chars().count() > MAX_TOKEN_CHARS {
        truncated.push_str("...");
    }
    truncated
}
