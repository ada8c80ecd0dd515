//! Answer-generation collaborator.
//!
//! The core treats reply generation as an opaque function: prompt text
//! plus prior turns in, reply text out, [`GenerationError`] on any
//! internal fault. No part of the pipeline looks inside.

use async_trait::async_trait;

use ribit_types::error::GenerationError;

use crate::context::Turn;

/// Produces reply text for a free-form query.
#[async_trait]
pub trait AnswerEngine: Send + Sync {
    /// Generate a reply for `prompt`, given the room's recent turns
    /// (oldest first, possibly empty).
    async fn generate(
        &self,
        prompt: &str,
        prior_turns: &[Turn],
    ) -> Result<String, GenerationError>;
}
