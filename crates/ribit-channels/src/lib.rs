//! Matrix transport for the ribit agent.
//!
//! Implements the transport collaborator the core pipeline talks to:
//! a typed client for the subset of the Matrix client-server API the
//! agent needs, and a sync-loop channel that feeds inbound events to
//! the event bus and auto-joins rooms on invitation.

pub mod matrix;

pub use matrix::channel::MatrixChannel;
pub use matrix::client::MatrixClient;
