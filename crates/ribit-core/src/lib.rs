//! Core engine for the ribit Matrix agent.
//!
//! Implements the message-intake decision pipeline and the
//! authorization/escalation state machine:
//!
//! ```text
//! InboundEvent (from EventBus)
//!   |
//!   v
//! TriggerClassifier   -- addressed to the agent? command or query?
//!   |
//!   v
//! RateLimiter         -- fixed window per sender
//!   |
//!   v
//! AuthorizationLedger -- privileged commands only; escalating denials
//!   |
//!   v
//! CommandRouter / AnswerEngine
//!   |
//!   v
//! Transport::send_message, then RoomContextStore update
//! ```
//!
//! The answer engine, command handlers, and transport are external
//! collaborators reached through the traits in [`oracle`], [`commands`],
//! and [`transport`]. The [`dispatcher::Dispatcher`] wires the pipeline
//! together with one worker task per room, so a slow reply in one room
//! never stalls another.

pub mod auth;
pub mod bus;
pub mod classifier;
pub mod commands;
pub mod context;
pub mod dispatcher;
pub mod handlers;
pub mod oracle;
pub mod rate_limit;
pub mod replies;
pub mod transport;
