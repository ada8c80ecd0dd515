//! Classified form of a message directed at the agent.
//!
//! The trigger classifier turns raw message text into a [`Directive`]:
//! a recognized command (public or privileged, decided by a static
//! command table, never by the caller's identity) or a free-form query
//! for the answer engine.

/// Authorization class of a command.
///
/// Assigned statically per command name. A privileged command is
/// additionally gated on the caller being in the authorized set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Anyone may invoke.
    Public,
    /// Restricted to the configured identity allow-list.
    Privileged,
}

/// What an addressed message asks the agent to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// A recognized command anyone may run (e.g. `?help`).
    PublicCommand {
        /// Command name, lowercased, without the prefix character.
        name: String,
        /// Remainder of the payload after the command name, trimmed.
        args: String,
    },

    /// A recognized command restricted to authorized identities
    /// (e.g. `?sys`, `?command <action>`).
    PrivilegedCommand {
        /// Command name, lowercased, without the prefix character.
        name: String,
        /// Remainder of the payload after the command name, trimmed.
        args: String,
    },

    /// Anything else addressed at the agent, handed to the answer
    /// engine verbatim. May be empty.
    FreeFormQuery {
        /// Payload text after trigger stripping.
        text: String,
    },
}

impl Directive {
    /// Privilege class of this directive, if it is a command.
    pub fn privilege(&self) -> Option<Privilege> {
        match self {
            Directive::PublicCommand { .. } => Some(Privilege::Public),
            Directive::PrivilegedCommand { .. } => Some(Privilege::Privileged),
            Directive::FreeFormQuery { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privilege_of_variants() {
        let public = Directive::PublicCommand {
            name: "help".into(),
            args: String::new(),
        };
        let privileged = Directive::PrivilegedCommand {
            name: "sys".into(),
            args: String::new(),
        };
        let query = Directive::FreeFormQuery { text: "hi".into() };

        assert_eq!(public.privilege(), Some(Privilege::Public));
        assert_eq!(privileged.privilege(), Some(Privilege::Privileged));
        assert_eq!(query.privilege(), None);
    }
}
