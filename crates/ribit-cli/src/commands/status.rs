//! `ribit status` -- show configuration status and diagnostics.
//!
//! Discovers the active configuration file, parses it, and displays a
//! summary of the resolved settings.
//!
//! # Example
//!
//! ```text
//! ribit status
//! ribit status --config /path/to/config.json
//! ```

use clap::Args;

use super::{discover_config_path, load_config};

/// Arguments for the `ribit status` subcommand.
#[derive(Args)]
pub struct StatusArgs {
    /// Config file path (overrides auto-discovery).
    #[arg(short, long)]
    pub config: Option<String>,
}

/// Run the status command.
pub fn run(args: StatusArgs) -> anyhow::Result<()> {
    println!("ribit status");
    println!("============");
    println!();

    match args.config.as_deref() {
        Some(path) => println!("Config: {path}"),
        None => match discover_config_path() {
            Some(path) => println!("Config: {}", path.display()),
            None => {
                println!("Config: not found");
                println!("  Searched: $RIBIT_CONFIG, ~/.ribit/config.json");
                println!();
                println!("Using defaults:");
            }
        },
    }

    let config = load_config(args.config.as_deref())?;

    println!();
    println!("Matrix:");
    println!("  Homeserver:       {}", or_unset(&config.matrix.homeserver_url));
    println!("  User ID:          {}", or_unset(&config.matrix.user_id));
    println!(
        "  Access token:     {}",
        if config.matrix.access_token.is_empty() {
            "(unset)"
        } else {
            "set"
        }
    );
    println!("  Auto-join:        {}", config.matrix.auto_join);

    println!();
    println!("Triggers:");
    println!("  Tokens:           {}", config.triggers.tokens.join(", "));
    println!("  Command prefix:   {}", config.triggers.command_prefix);

    println!();
    println!("Authorization:");
    println!(
        "  Authorized users: {}",
        config.authorization.authorized_users.len()
    );
    for user in &config.authorization.authorized_users {
        println!("    - {user}");
    }
    match config.authorization.denial_ttl_secs {
        Some(secs) => println!("  Denial TTL:       {secs}s"),
        None => println!("  Denial TTL:       none (process lifetime)"),
    }

    println!();
    println!("Rate limit:");
    println!(
        "  {} events / {}s per sender",
        config.rate_limit.max_events, config.rate_limit.window_secs
    );

    println!();
    println!("Context:");
    println!("  Max turns:        {}", config.context.max_turns);
    match config.context.max_idle_secs {
        Some(secs) => println!("  Max idle:         {secs}s"),
        None => println!("  Max idle:         none"),
    }

    Ok(())
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() { "(unset)" } else { value }
}
