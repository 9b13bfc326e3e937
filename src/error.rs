//! Error types for redlite

use crate::snapshot::SizeEncoding;
use std::io;
use thiserror::Error;

/// Result type alias for redlite operations
pub type Result<T> = std::result::Result<T, RedliteError>;

/// Custom error types for redlite
///
/// The `Display` text of the command-level variants is exactly what follows
/// `-ERR ` in the reply sent to the client.
#[derive(Error, Debug)]
pub enum RedliteError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("invalid command")]
    UnknownCommand(String),

    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(String),

    #[error("syntax error")]
    Syntax,

    #[error("invalid expiration time")]
    InvalidExpiry(String),

    #[error("unknown parameter '{0}'")]
    UnknownConfigParam(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("unsupported string encoding: {0:?}")]
    UnsupportedEncoding(SizeEncoding),

    #[error("truncated snapshot entry: expected {expected} bytes, found {found}")]
    TruncatedEntry { expected: usize, found: usize },

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for RedliteError {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        match err {
            nom::Err::Incomplete(needed) => {
                RedliteError::Protocol(format!("Incomplete frame: {:?}", needed))
            }
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                RedliteError::Protocol(format!("Parse error: {:?}", e.code))
            }
        }
    }
}
