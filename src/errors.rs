//! Error taxonomy for the engine.
//!
//! Nothing here is fatal to the reader loop except the two `ConfigError`
//! variants, which can only surface during startup.

use thiserror::Error;

/// Errors raised anywhere in the frame pipeline: extraction, dispatch,
/// outbound correlation. None of these terminate the process — callers
/// log and continue.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("JSON object exceeds {max} bytes")]
    FrameTooLong { max: usize },

    #[error("non-whitespace byte outside an object at offset {offset}")]
    FrameCorrupted { offset: usize },

    #[error("failed to parse frame as JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("endpoint not found")]
    UnknownEndpoint,

    #[error("input data failed schema validation: {0}")]
    InvalidInputData(String),

    #[error("handler returned a non-object, non-null value")]
    IllegalReturnType,

    #[error("handler panicked or returned an error: {0}")]
    HandlerFailure(String),

    #[error("outbound call timed out waiting for tag {tag}")]
    Timeout { tag: String },

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

/// Fatal startup-time configuration errors. The only exits from this
/// engine are process termination by the caller and configuration errors
/// raised at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown DBMS '{0}' (expected 'sqlite' or 'mysql')")]
    UnknownDbms(String),

    #[error("DBMS 'mysql' is not implemented by this gateway")]
    UnsupportedDbms,

    #[error("unknown MODE '{0}' (expected 'debug' or 'production')")]
    UnknownMode(String),

    #[error("invalid port number: '{0}'")]
    InvalidPort(String),
}
