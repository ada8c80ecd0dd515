//! `ribit gateway` -- connect to the homeserver and run the agent.
//!
//! # Lifecycle
//!
//! ```text
//! 1. Load + validate config
//! 2. Build stores (rate limiter, ledger, context store) and the
//!    command router with its built-in handlers
//! 3. Start the Matrix channel task (sync loop -> event bus)
//! 4. Run the dispatcher (event bus -> pipeline -> replies)
//! 5. Wait for Ctrl+C, then cancel both and drain
//! ```
//!
//! # Example
//!
//! ```text
//! ribit gateway
//! ribit gateway --config /path/to/config.json
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use ribit_channels::MatrixChannel;
use ribit_core::auth::AuthorizationLedger;
use ribit_core::bus::EventBus;
use ribit_core::classifier::TriggerClassifier;
use ribit_core::commands::CommandRouter;
use ribit_core::context::RoomContextStore;
use ribit_core::dispatcher::Dispatcher;
use ribit_core::handlers::{ActionHandler, HelpHandler, StatusHandler, SysHandler, SystemReporter};
use ribit_core::oracle::AnswerEngine;
use ribit_core::rate_limit::RateLimiter;
use ribit_core::replies;
use ribit_core::transport::Transport;

use crate::oracle::CannedOracle;

/// Arguments for the `ribit gateway` subcommand.
#[derive(Args)]
pub struct GatewayArgs {
    /// Config file path (overrides auto-discovery).
    #[arg(short, long)]
    pub config: Option<String>,
}

/// `?sys` reporter for the CLI process.
///
/// No host telemetry is sampled here; a deployment wanting real
/// CPU/memory figures plugs its own [`SystemReporter`] in.
struct HostReporter {
    started: Instant,
}

impl HostReporter {
    fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl SystemReporter for HostReporter {
    fn report(&self) -> String {
        let uptime = self.started.elapsed().as_secs();
        format!(
            "**System report**\n\
             Host: {}/{}\n\
             Process uptime: {}m {}s\n\
             Telemetry probe: not attached\n\
             Status: operational",
            std::env::consts::OS,
            std::env::consts::ARCH,
            uptime / 60,
            uptime % 60,
        )
    }
}

/// Run the gateway command.
pub async fn run(args: GatewayArgs) -> anyhow::Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    config.validate()?;

    // validate() guarantees a non-empty trigger list.
    let bot_name = config.triggers.tokens[0].clone();

    let channel = Arc::new(MatrixChannel::new(
        config.matrix.clone(),
        replies::welcome(&bot_name),
    ));
    let oracle: Arc<dyn AnswerEngine> = Arc::new(CannedOracle::new());

    let mut router = CommandRouter::new();
    router.register("help", Arc::new(HelpHandler::new(bot_name.clone())));
    router.register(
        "status",
        Arc::new(StatusHandler::new(
            config.matrix.user_id.clone(),
            channel.room_counter(),
        )),
    );
    router.register("sys", Arc::new(SysHandler::new(Arc::new(HostReporter::new()))));
    router.register("command", Arc::new(ActionHandler::new(oracle.clone())));

    let dispatcher = Dispatcher::new(
        config.matrix.user_id.clone(),
        TriggerClassifier::from_config(&config.triggers),
        RateLimiter::new(config.rate_limit.max_events, config.rate_limit.window_secs),
        AuthorizationLedger::new(config.authorization.authorized_users.iter().cloned())
            .with_denial_ttl(config.authorization.denial_ttl_secs.map(Duration::from_secs)),
        RoomContextStore::new(config.context.max_turns)
            .with_max_idle(config.context.max_idle_secs.map(Duration::from_secs)),
        router,
        oracle,
        channel.clone() as Arc<dyn Transport>,
    );

    let bus = Arc::new(EventBus::new());
    let cancel = CancellationToken::new();

    info!(
        homeserver = %config.matrix.homeserver_url,
        user_id = %config.matrix.user_id,
        trigger = %bot_name,
        "starting ribit gateway"
    );

    let channel_task = {
        let channel = Arc::clone(&channel);
        let events = bus.sender();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = channel.start(events, cancel).await {
                error!(error = %e, "matrix channel failed");
            }
        })
    };

    let dispatcher_task = {
        let bus = Arc::clone(&bus);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            dispatcher.run(&bus, cancel).await;
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    cancel.cancel();
    let _ = tokio::join!(channel_task, dispatcher_task);

    Ok(())
}
