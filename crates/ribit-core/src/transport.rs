//! Outbound transport collaborator.
//!
//! The dispatcher sends replies through this trait so that the context
//! update can be gated on send success. The concrete implementation
//! (the Matrix channel) lives in `ribit-channels`.

use async_trait::async_trait;

use ribit_types::error::ChannelError;

/// Sends messages to a room.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a text message to a room.
    async fn send_message(&self, room_id: &str, body: &str) -> Result<(), ChannelError>;
}
