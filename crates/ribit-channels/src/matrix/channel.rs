//! [`MatrixChannel`] -- the agent's transport on Matrix.
//!
//! Long-polls `/sync` and converts `m.room.message` timeline events
//! into [`InboundEvent`]s for the dispatcher. The initial sync only
//! establishes the `since` token: its timeline is discarded so the
//! agent never replays messages that predate startup. Room invitations
//! are auto-accepted (a transport-level policy, not core logic) with a
//! welcome message posted on join.
//!
//! Implements [`Transport`] so the dispatcher can observe send success
//! before committing context updates.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ribit_core::transport::Transport;
use ribit_types::config::MatrixConfig;
use ribit_types::error::ChannelError;
use ribit_types::event::InboundEvent;

use super::client::MatrixClient;
use super::types::{RoomEvent, SyncResponse};

/// Long-poll timeout for `/sync`, in milliseconds.
const SYNC_TIMEOUT_MS: u64 = 30_000;

/// Delay before retrying after a sync error, in seconds.
const ERROR_RETRY_DELAY_SECS: u64 = 5;

/// Matrix channel: sync loop plus outbound sends.
pub struct MatrixChannel {
    client: MatrixClient,
    config: MatrixConfig,
    welcome: String,
    joined: std::sync::RwLock<HashSet<String>>,
    room_count: Arc<AtomicUsize>,
}

impl MatrixChannel {
    /// Create a channel from the Matrix config section.
    ///
    /// `welcome` is posted to a room right after an invitation is
    /// accepted.
    pub fn new(config: MatrixConfig, welcome: String) -> Self {
        Self {
            client: MatrixClient::new(&config.homeserver_url, config.access_token.clone()),
            config,
            welcome,
            joined: std::sync::RwLock::new(HashSet::new()),
            room_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared joined-room counter (consumed by the status handler).
    pub fn room_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.room_count)
    }

    /// Run the sync loop until `cancel` fires.
    ///
    /// Inbound events are delivered through `events`; if its receiver
    /// goes away the loop exits, since there is nobody left to process
    /// messages.
    pub async fn start(
        &self,
        events: mpsc::Sender<InboundEvent>,
        cancel: CancellationToken,
    ) -> Result<(), ChannelError> {
        if self.config.homeserver_url.is_empty() {
            return Err(ChannelError::Other(
                "matrix: homeserverUrl is required".into(),
            ));
        }
        if self.config.access_token.is_empty() {
            return Err(ChannelError::Other("matrix: accessToken is required".into()));
        }
        if self.config.user_id.is_empty() {
            return Err(ChannelError::Other("matrix: userId is required".into()));
        }

        let who = self.client.whoami().await?;
        if who.user_id != self.config.user_id {
            warn!(
                configured = %self.config.user_id,
                actual = %who.user_id,
                "access token belongs to a different user than configured"
            );
        }
        info!(user_id = %who.user_id, "matrix channel authenticated");

        // Initial sync: establish the since token, register rooms and
        // pending invites, and discard the timeline backlog.
        let initial = self.client.sync(None, 0).await?;
        let mut since = initial.next_batch.clone();
        self.process_sync(&initial, None).await;
        info!(
            rooms = self.room_count.load(Ordering::Relaxed),
            "initial sync completed, backlog discarded"
        );

        loop {
            let sync = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("matrix channel cancelled");
                    return Ok(());
                }
                result = self.client.sync(Some(&since), SYNC_TIMEOUT_MS) => result,
            };

            match sync {
                Ok(response) => {
                    since = response.next_batch.clone();
                    if !self.process_sync(&response, Some(&events)).await {
                        info!("event receiver dropped, matrix channel exiting");
                        return Ok(());
                    }
                }
                Err(e) => {
                    error!(error = %e, "sync failed");
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("matrix channel cancelled during error backoff");
                            return Ok(());
                        }
                        _ = tokio::time::sleep(
                            Duration::from_secs(ERROR_RETRY_DELAY_SECS)
                        ) => {}
                    }
                }
            }
        }
    }

    /// Handle one sync response: invitations, room tracking, and (when
    /// `events` is given) message delivery. Returns `false` once the
    /// event receiver is gone.
    async fn process_sync(
        &self,
        sync: &SyncResponse,
        events: Option<&mpsc::Sender<InboundEvent>>,
    ) -> bool {
        for room_id in sync.rooms.invite.keys() {
            self.handle_invite(room_id).await;
        }

        for (room_id, room) in &sync.rooms.join {
            self.track_room(room_id);

            let Some(events) = events else { continue };
            for event in &room.timeline.events {
                let Some(inbound) = self.to_inbound(room_id, event) else {
                    continue;
                };
                if events.send(inbound).await.is_err() {
                    return false;
                }
            }
        }
        true
    }

    /// Accept (or skip) a room invitation.
    async fn handle_invite(&self, room_id: &str) {
        if !self.config.auto_join {
            debug!(room_id, "ignoring invite (autoJoin disabled)");
            return;
        }
        info!(room_id, "accepting room invitation");
        match self.client.join_room(room_id).await {
            Ok(joined) => {
                self.track_room(&joined);
                if let Err(e) = self.client.send_text(&joined, &self.welcome).await {
                    warn!(room_id = %joined, error = %e, "failed to post welcome message");
                }
            }
            Err(e) => error!(room_id, error = %e, "failed to join room"),
        }
    }

    /// Record a joined room and refresh the shared counter.
    fn track_room(&self, room_id: &str) {
        let mut joined = match self.joined.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if joined.insert(room_id.to_owned()) {
            self.room_count.store(joined.len(), Ordering::Relaxed);
            debug!(room_id, "tracking room");
        }
    }

    /// Convert a timeline event into an [`InboundEvent`].
    ///
    /// Returns `None` for non-text events and for the agent's own
    /// messages (also re-checked by the dispatcher).
    fn to_inbound(&self, room_id: &str, event: &RoomEvent) -> Option<InboundEvent> {
        let body = event.text_body()?;
        if event.sender == self.config.user_id {
            return None;
        }
        let timestamp = Utc
            .timestamp_millis_opt(event.origin_server_ts)
            .single()
            .unwrap_or_else(Utc::now);
        Some(InboundEvent {
            room_id: room_id.to_owned(),
            sender: event.sender.clone(),
            body: body.to_owned(),
            event_id: event.event_id.clone(),
            timestamp,
            mentioned: event.mentions(&self.config.user_id),
        })
    }
}

#[async_trait]
impl Transport for MatrixChannel {
    async fn send_message(&self, room_id: &str, body: &str) -> Result<(), ChannelError> {
        self.client.send_text(room_id, body).await.map(|_| ())
    }
}
