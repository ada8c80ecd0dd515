//! Built-in canned answer engine.
//!
//! A deterministic stand-in for a real generation service so the
//! gateway runs end-to-end out of the box. Keyword-matched responses
//! with a fallback that names the prompt; the conversation context
//! only influences the greeting. Deployments wanting real answers
//! implement [`AnswerEngine`] against their service of choice.

use async_trait::async_trait;

use ribit_core::context::Turn;
use ribit_core::oracle::AnswerEngine;
use ribit_types::error::GenerationError;

/// Deterministic keyword-matching responder.
#[derive(Default)]
pub struct CannedOracle;

impl CannedOracle {
    /// Create the canned oracle.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AnswerEngine for CannedOracle {
    async fn generate(
        &self,
        prompt: &str,
        prior_turns: &[Turn],
    ) -> Result<String, GenerationError> {
        let lower = prompt.to_lowercase();

        let reply = if ["hello", "hi", "hey", "greetings"]
            .iter()
            .any(|g| lower.starts_with(g))
        {
            if prior_turns.is_empty() {
                "Hello! I'm ribit, an automation agent. What would you like to talk about?"
                    .to_owned()
            } else {
                "Hello again! We were just talking -- go on.".to_owned()
            }
        } else if lower.contains("what can you do") || lower.contains("capabilit") {
            "I listen for my name in rooms, answer questions, and run a small set of \
             commands -- try ?help for the list."
                .to_owned()
        } else if lower.contains("thank") {
            "You're welcome!".to_owned()
        } else {
            format!(
                "An interesting thought. My built-in reasoning about \"{prompt}\" is \
                 limited -- connect a full generation engine for deeper answers."
            )
        };

        Ok(reply)
    }
}
