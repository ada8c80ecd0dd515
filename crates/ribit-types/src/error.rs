//! Error types shared across the workspace.
//!
//! [`RibitError`] is the top-level error; [`ChannelError`] covers
//! transport failures; [`GenerationError`] and [`CommandError`] are the
//! failure modes of the two external collaborators the dispatcher calls.
//! All are non-exhaustive except the opaque [`GenerationError`].

use thiserror::Error;

/// Top-level error type for the ribit agent.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RibitError {
    /// Configuration is malformed or semantically invalid.
    #[error("invalid config: {reason}")]
    ConfigInvalid {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The event bus rejected a message (closed or full).
    #[error("event bus error: {0}")]
    Bus(String),

    /// A transport-layer error bubbled up.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Transport-specific error type.
///
/// Reported by the Matrix channel for failures in connecting,
/// authenticating, syncing, or sending.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ChannelError {
    /// Failed to reach the homeserver.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The access token was rejected.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Sending a message failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receiving or decoding sync data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Catch-all for errors that do not fit other variants.
    #[error("{0}")]
    Other(String),
}

/// Opaque failure of the answer-generation collaborator.
///
/// The core has no visibility into the engine's internals; every fault
/// surfaces as this single error.
#[derive(Error, Debug)]
#[error("generation failed: {0}")]
pub struct GenerationError(pub String);

/// Failure modes of a command handler dispatch.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CommandError {
    /// No handler is registered under the requested name.
    #[error("command not found: {0}")]
    NotFound(String),

    /// The handler itself failed.
    #[error("command failed: {0}")]
    Failed(String),
}

/// A convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, RibitError>;
