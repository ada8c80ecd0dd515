//! Fixed user-visible reply strings.
//!
//! All canned text lives here so that copy edits never touch policy
//! code. The denial ladder is a pure function of the denial count.

/// Reply for a denied privileged command at the given tier.
///
/// Tier 1 is a polite refusal, tier 2 a warning, and every tier from 3
/// up repeats the same message -- the ladder does not grow forever.
pub fn denial(tier: u32) -> &'static str {
    match tier {
        0 | 1 => "I can't do this silly thing! Only authorized users can run system commands.",
        2 => "Action terminated! You've tried that again. Should I enable terminator mode? \
              (Just kidding.)",
        _ => "TERMINATOR MODE ACTIVATED! ...just kidding. I'm still the same polite assistant, \
              and the answer is still no. Perhaps we could talk about something more interesting?",
    }
}

/// Generic reply when a collaborator fails mid-request.
pub const APOLOGY: &str =
    "I apologize, but I ran into an error while handling that. Please try again.";

/// Reply when the agent is addressed with an empty payload.
pub const HELP_PROMPT: &str =
    "You called? Write a message after my name to chat, or send ?help to see what I can do.";

/// One-shot notice for a freshly throttled sender.
pub const SLOW_DOWN: &str = "Please slow down a little. I'll catch up with you shortly.";

/// Acknowledgement for a context reset.
pub const RESET_ACK: &str = "Conversation context reset. How may I assist you?";

/// Greeting posted after accepting a room invitation.
pub fn welcome(bot_name: &str) -> String {
    format!(
        "Greetings! I am ribit, an automation agent. Say '{bot_name}' to chat with me, \
         or use ?help for commands."
    )
}

/// Body of the `?help` command.
pub fn help_text(bot_name: &str) -> String {
    format!(
        "**ribit commands**\n\
         \n\
         Chat:\n\
         - `{bot_name} <message>` - chat with me\n\
         - `!reset` - clear this room's conversation context\n\
         \n\
         General:\n\
         - `?help` - show this help\n\
         \n\
         Restricted (authorized users only):\n\
         - `?sys` - system report\n\
         - `?status` - agent status\n\
         - `?command <action>` - analyze an action"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_three_is_absorbing() {
        assert_ne!(denial(1), denial(2));
        assert_ne!(denial(2), denial(3));
        assert_eq!(denial(3), denial(4));
        assert_eq!(denial(3), denial(100));
    }

    #[test]
    fn tier_zero_maps_to_first_refusal() {
        assert_eq!(denial(0), denial(1));
    }

    #[test]
    fn welcome_names_the_bot() {
        assert!(welcome("ribit.2.0").contains("ribit.2.0"));
    }

    #[test]
    fn help_lists_commands() {
        let help = help_text("ribit.2.0");
        for needle in ["?help", "?sys", "?status", "?command", "!reset"] {
            assert!(help.contains(needle), "help text missing {needle}");
        }
    }
}
