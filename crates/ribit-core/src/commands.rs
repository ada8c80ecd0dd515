//! Command handler contract and router.
//!
//! [`CommandRouter`] maps a recognized command name to a
//! [`CommandHandler`]. Handlers are external collaborators: each may
//! fail independently without affecting the others, and a handler
//! failure never propagates past the dispatcher's apologetic reply.
//!
//! Authorization is not checked here -- by the time a command reaches
//! the router, the dispatcher has already consulted the ledger.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use ribit_types::error::CommandError;

/// A single command implementation.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle the command, returning reply text.
    ///
    /// `args` is the payload after the command name (possibly empty);
    /// `sender` is the full identity of the caller.
    async fn handle(&self, args: &str, sender: &str) -> Result<String, CommandError>;
}

/// Registry mapping command names to handlers.
#[derive(Default)]
pub struct CommandRouter {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a command name, replacing any previous
    /// handler with the same name.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        let name = name.into();
        debug!(command = %name, "registering command handler");
        self.handlers.insert(name, handler);
    }

    /// Dispatch a command to its handler.
    pub async fn dispatch(
        &self,
        name: &str,
        args: &str,
        sender: &str,
    ) -> Result<String, CommandError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| CommandError::NotFound(name.to_owned()))?;
        handler.handle(args, sender).await
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
