//! Shared types for the ribit Matrix agent.
//!
//! This crate carries the data model the rest of the workspace agrees on:
//!
//! - [`event::InboundEvent`] -- a message delivered by the transport layer
//! - [`directive::Directive`] -- the classified form of a directed message
//! - [`config::BotConfig`] -- the startup-only configuration surface
//! - [`error`] -- error types shared across crates
//! - [`secret::SecretString`] -- redacting wrapper for the access token

pub mod config;
pub mod directive;
pub mod error;
pub mod event;
pub mod secret;

pub use error::Result;
