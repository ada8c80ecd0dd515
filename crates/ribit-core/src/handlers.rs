//! Built-in command handlers.
//!
//! The command set mirrors the deployed bot: a public `help`, a
//! privileged `status` report, a privileged `sys` report delegated to
//! an injected [`SystemReporter`] (the core never samples telemetry
//! itself), and a privileged `command <action>` that asks the answer
//! engine to analyze the action instead of executing anything.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use async_trait::async_trait;

use ribit_types::error::CommandError;

use crate::commands::CommandHandler;
use crate::oracle::AnswerEngine;
use crate::replies;

/// Supplies the `?sys` report text.
///
/// Implementations live outside the core; a deployment can plug a real
/// host probe here without touching pipeline code.
pub trait SystemReporter: Send + Sync {
    /// A human-readable system report.
    fn report(&self) -> String;
}

// ── help ─────────────────────────────────────────────────────────────

/// Public `?help` handler.
pub struct HelpHandler {
    bot_name: String,
}

impl HelpHandler {
    /// `bot_name` is the primary trigger token shown in examples.
    pub fn new(bot_name: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
        }
    }
}

#[async_trait]
impl CommandHandler for HelpHandler {
    async fn handle(&self, _args: &str, _sender: &str) -> Result<String, CommandError> {
        Ok(replies::help_text(&self.bot_name))
    }
}

// ── status ───────────────────────────────────────────────────────────

/// Privileged `?status` handler: identity, uptime, joined-room count.
pub struct StatusHandler {
    identity: String,
    started: Instant,
    joined_rooms: Arc<AtomicUsize>,
}

impl StatusHandler {
    /// `joined_rooms` is shared with the transport, which keeps it current.
    pub fn new(identity: impl Into<String>, joined_rooms: Arc<AtomicUsize>) -> Self {
        Self {
            identity: identity.into(),
            started: Instant::now(),
            joined_rooms,
        }
    }
}

#[async_trait]
impl CommandHandler for StatusHandler {
    async fn handle(&self, _args: &str, _sender: &str) -> Result<String, CommandError> {
        let uptime = self.started.elapsed();
        let mins = uptime.as_secs() / 60;
        let secs = uptime.as_secs() % 60;
        Ok(format!(
            "**ribit status**\n\
             Identity: {}\n\
             Uptime: {mins}m {secs}s\n\
             Joined rooms: {}\n\
             Status: operational",
            self.identity,
            self.joined_rooms.load(Ordering::Relaxed),
        ))
    }
}

// ── sys ──────────────────────────────────────────────────────────────

/// Privileged `?sys` handler delegating to a [`SystemReporter`].
pub struct SysHandler {
    reporter: Arc<dyn SystemReporter>,
}

impl SysHandler {
    /// Wrap a reporter.
    pub fn new(reporter: Arc<dyn SystemReporter>) -> Self {
        Self { reporter }
    }
}

#[async_trait]
impl CommandHandler for SysHandler {
    async fn handle(&self, _args: &str, _sender: &str) -> Result<String, CommandError> {
        Ok(self.reporter.report())
    }
}

// ── command ──────────────────────────────────────────────────────────

/// Privileged `?command <action>` handler.
///
/// Asks the answer engine what it makes of the action; nothing is
/// actually executed on the host.
pub struct ActionHandler {
    oracle: Arc<dyn AnswerEngine>,
}

impl ActionHandler {
    /// Wrap an answer engine.
    pub fn new(oracle: Arc<dyn AnswerEngine>) -> Self {
        Self { oracle }
    }
}

#[async_trait]
impl CommandHandler for ActionHandler {
    async fn handle(&self, args: &str, _sender: &str) -> Result<String, CommandError> {
        let action = args.trim();
        if action.is_empty() {
            return Ok("Usage: ?command <action>".into());
        }
        let analysis = self
            .oracle
            .generate(&format!("Analyze this requested action: {action}"), &[])
            .await
            .map_err(|e| CommandError::Failed(e.to_string()))?;
        Ok(format!(
            "Action analysis: {action}\n\n{analysis}\n\n\
             Note: direct system execution is disabled."
        ))
    }
}
