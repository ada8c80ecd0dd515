//! Trigger classification for inbound messages.
//!
//! [`TriggerClassifier`] decides whether a message is addressed to the
//! agent and, if so, classifies the payload as a command or a free-form
//! query. It has no side effects and is safe to call from any number of
//! concurrent event streams.
//!
//! A message is addressed to the agent when any of:
//!
//! - the trimmed text starts (case-insensitively) with a configured
//!   trigger token (`"ribit.2.0 hello"`),
//! - the event carries an explicit mention,
//! - the text starts with the command prefix (`"?help"`),
//! - the text starts with the reset keyword (`"!reset"`).
//!
//! Chat input is untrusted free text, so nothing here ever errors:
//! an unrecognized command name falls through to a free-form query.

use std::collections::HashMap;

use ribit_types::config::TriggerConfig;
use ribit_types::directive::{Directive, Privilege};

/// Keyword that clears a room's conversation context.
const RESET_KEYWORD: &str = "!reset";

/// Characters that may separate a trigger token from the payload.
const TOKEN_SEPARATORS: [char; 2] = [',', ':'];

/// Stateless classifier for inbound message text.
pub struct TriggerClassifier {
    /// Trigger tokens, lowercased, longest first so that `"ribit.2.0"`
    /// wins over its prefix `"ribit"`.
    tokens: Vec<String>,
    command_prefix: char,
    privileges: HashMap<&'static str, Privilege>,
}

impl TriggerClassifier {
    /// Create a classifier with the given trigger tokens and prefix.
    pub fn new(tokens: &[String], command_prefix: char) -> Self {
        let mut tokens: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
        tokens.sort_by_key(|t| std::cmp::Reverse(t.len()));
        Self {
            tokens,
            command_prefix,
            privileges: default_privileges(),
        }
    }

    /// Create a classifier from the trigger configuration section.
    pub fn from_config(config: &TriggerConfig) -> Self {
        Self::new(&config.tokens, config.command_prefix)
    }

    /// Classify raw message text.
    ///
    /// Returns `None` when the message is not addressed to the agent.
    /// `mentioned` is the transport's explicit-mention flag.
    pub fn classify(&self, raw: &str, mentioned: bool) -> Option<Directive> {
        let text = raw.trim();

        let payload = if let Some(rest) = self.strip_trigger(text) {
            rest
        } else if mentioned
            || text.starts_with(self.command_prefix)
            || starts_with_ignore_case(text, RESET_KEYWORD)
        {
            text
        } else {
            return None;
        };

        Some(self.classify_payload(payload.trim()))
    }

    /// Strip a leading trigger token plus separators, if present.
    ///
    /// The token must be followed by whitespace, a separator character,
    /// or end of text; `"ribitish"` does not match the token `"ribit"`.
    fn strip_trigger<'a>(&self, text: &'a str) -> Option<&'a str> {
        for token in &self.tokens {
            let Some(rest) = strip_prefix_ignore_case(text, token) else {
                continue;
            };
            match rest.chars().next() {
                None => return Some(""),
                Some(c) if c.is_whitespace() || TOKEN_SEPARATORS.contains(&c) => {
                    return Some(rest.trim_start_matches(TOKEN_SEPARATORS).trim_start());
                }
                Some(_) => continue,
            }
        }
        None
    }

    /// Classify a stripped payload as command or query.
    fn classify_payload(&self, payload: &str) -> Directive {
        if starts_with_ignore_case(payload, RESET_KEYWORD) {
            return Directive::PublicCommand {
                name: "reset".into(),
                args: String::new(),
            };
        }

        if let Some(rest) = payload.strip_prefix(self.command_prefix) {
            let (name, args) = match rest.split_once(char::is_whitespace) {
                Some((name, args)) => (name, args.trim()),
                None => (rest, ""),
            };
            let name = name.to_lowercase();
            if let Some(privilege) = self.privileges.get(name.as_str()) {
                return match privilege {
                    Privilege::Public => Directive::PublicCommand {
                        name,
                        args: args.to_owned(),
                    },
                    Privilege::Privileged => Directive::PrivilegedCommand {
                        name,
                        args: args.to_owned(),
                    },
                };
            }
            // Unknown command name: chat input is free text, fall through.
        }

        Directive::FreeFormQuery {
            text: payload.to_owned(),
        }
    }
}

/// Static command-name to privilege table.
///
/// Privilege is a property of the command, never of the caller.
fn default_privileges() -> HashMap<&'static str, Privilege> {
    HashMap::from([
        ("help", Privilege::Public),
        ("reset", Privilege::Public),
        ("sys", Privilege::Privileged),
        ("status", Privilege::Privileged),
        ("command", Privilege::Privileged),
    ])
}

/// Case-insensitive prefix strip that never slices mid-character.
///
/// `prefix` is expected pre-lowercased. Comparison lowercases each text
/// character, so multi-byte input cannot cause a boundary panic.
fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let mut end = 0;
    let mut chars = text.char_indices();
    for pc in prefix.chars() {
        let (i, c) = chars.next()?;
        if !c.to_lowercase().eq(pc.to_lowercase()) {
            return None;
        }
        end = i + c.len_utf8();
    }
    Some(&text[end..])
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    strip_prefix_ignore_case(text, &prefix.to_lowercase()).is_some()
}
