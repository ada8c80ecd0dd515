//! HTTP client wrapper for the Matrix client-server API.
//!
//! [`MatrixClient`] provides typed methods for the subset of the API
//! the agent uses: `whoami`, `sync`, `send` (text messages), and
//! `join`. Authentication is a bearer access token on every request.

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Client, StatusCode};
use tracing::{debug, trace};
use uuid::Uuid;

use ribit_types::error::ChannelError;
use ribit_types::secret::SecretString;

use super::types::{
    JoinResponse, MatrixErrorBody, SendMessageRequest, SendMessageResponse, SyncResponse,
    WhoAmIResponse,
};

/// Typed client for the Matrix client-server API.
///
/// Wraps a [`reqwest::Client`] plus the homeserver base URL and access
/// token. The base URL can be overridden for testing.
pub struct MatrixClient {
    http: Client,
    base_url: String,
    access_token: SecretString,
}

impl MatrixClient {
    /// Create a client for the given homeserver.
    ///
    /// `homeserver_url` is the server root (e.g. `https://envs.net`);
    /// the `/_matrix/client/v3` prefix is appended here.
    pub fn new(homeserver_url: &str, access_token: SecretString) -> Self {
        let base_url = format!(
            "{}/_matrix/client/v3",
            homeserver_url.trim_end_matches('/')
        );
        Self {
            http: Client::new(),
            base_url,
            access_token,
        }
    }

    /// Identify the user the access token belongs to.
    ///
    /// Doubles as a token check at startup: a rejected token surfaces
    /// as [`ChannelError::AuthFailed`] before the sync loop starts.
    pub async fn whoami(&self) -> Result<WhoAmIResponse, ChannelError> {
        let url = format!("{}/account/whoami", self.base_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(self.access_token.reveal())
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        let resp = check_status(resp).await?;
        resp.json()
            .await
            .map_err(|e| ChannelError::ReceiveFailed(e.to_string()))
    }

    /// Long-poll for new events.
    ///
    /// `since` is the `next_batch` token from the previous sync (absent
    /// for the initial sync); `timeout_ms` is the long-poll timeout.
    pub async fn sync(
        &self,
        since: Option<&str>,
        timeout_ms: u64,
    ) -> Result<SyncResponse, ChannelError> {
        let mut url = format!("{}/sync?timeout={timeout_ms}", self.base_url);
        if let Some(since) = since {
            url.push_str("&since=");
            url.extend(utf8_percent_encode(since, NON_ALPHANUMERIC));
        }

        trace!(url = %url, "syncing");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(self.access_token.reveal())
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        let resp = check_status(resp).await?;
        let sync: SyncResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::ReceiveFailed(e.to_string()))?;

        debug!(
            joined = sync.rooms.join.len(),
            invites = sync.rooms.invite.len(),
            "sync completed"
        );
        Ok(sync)
    }

    /// Send a text message to a room, returning the new event ID.
    pub async fn send_text(&self, room_id: &str, body: &str) -> Result<String, ChannelError> {
        let txn_id = Uuid::new_v4();
        let url = format!(
            "{}/rooms/{}/send/m.room.message/{txn_id}",
            self.base_url,
            encode_segment(room_id),
        );

        debug!(room_id, bytes = body.len(), "sending message");

        let resp = self
            .http
            .put(&url)
            .bearer_auth(self.access_token.reveal())
            .json(&SendMessageRequest {
                msgtype: "m.text",
                body,
            })
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        let resp = check_status(resp).await?;
        let sent: SendMessageResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        Ok(sent.event_id)
    }

    /// Join a room by ID.
    pub async fn join_room(&self, room_id: &str) -> Result<String, ChannelError> {
        let url = format!("{}/join/{}", self.base_url, encode_segment(room_id));

        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.access_token.reveal())
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        let resp = check_status(resp).await?;
        let joined: JoinResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::ReceiveFailed(e.to_string()))?;
        Ok(joined.room_id)
    }
}

/// Percent-encode a path segment (room IDs contain `!` and `:`).
fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, NON_ALPHANUMERIC).to_string()
}

/// Map non-2xx responses onto [`ChannelError`], reading the standard
/// Matrix error body when present.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ChannelError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body: MatrixErrorBody = resp.json().await.unwrap_or(MatrixErrorBody {
        errcode: String::new(),
        error: String::new(),
    });
    let detail = if body.errcode.is_empty() {
        format!("http {status}")
    } else {
        format!("http {status}: {} ({})", body.error, body.errcode)
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ChannelError::AuthFailed(detail)),
        _ => Err(ChannelError::ReceiveFailed(detail)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server_url: &str) -> MatrixClient {
        MatrixClient::new(server_url, SecretString::new("syt_test_token"))
    }

    #[tokio::test]
    async fn whoami_returns_user_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/account/whoami"))
            .and(header("Authorization", "Bearer syt_test_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "user_id": "@ribit.2.0:envs.net"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let who = client(&server.uri()).whoami().await.unwrap();
        assert_eq!(who.user_id, "@ribit.2.0:envs.net");
    }

    #[tokio::test]
    async fn whoami_maps_unknown_token_to_auth_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/account/whoami"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "errcode": "M_UNKNOWN_TOKEN",
                "error": "Invalid access token"
            })))
            .mount(&server)
            .await;

        let err = client(&server.uri()).whoami().await.unwrap_err();
        assert!(matches!(err, ChannelError::AuthFailed(_)));
        assert!(err.to_string().contains("M_UNKNOWN_TOKEN"));
    }

    #[tokio::test]
    async fn sync_passes_since_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/sync"))
            .and(query_param("since", "s_prev"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "next_batch": "s_next"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sync = client(&server.uri())
            .sync(Some("s_prev"), 30_000)
            .await
            .unwrap();
        assert_eq!(sync.next_batch, "s_next");
    }

    #[tokio::test]
    async fn initial_sync_omits_since() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/sync"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "next_batch": "s0"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sync = client(&server.uri()).sync(None, 0).await.unwrap();
        assert_eq!(sync.next_batch, "s0");
    }

    #[tokio::test]
    async fn send_text_hits_room_send_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_regex(
                r"^/_matrix/client/v3/rooms/[^/]+/send/m\.room\.message/[^/]+$",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "event_id": "$sent"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let event_id = client(&server.uri())
            .send_text("!lab:envs.net", "hello")
            .await
            .unwrap();
        assert_eq!(event_id, "$sent");
    }

    #[tokio::test]
    async fn send_text_failure_maps_to_channel_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/_matrix/client/v3/rooms/.+/send/.+$"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "errcode": "M_UNKNOWN",
                "error": "Internal server error"
            })))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .send_text("!lab:envs.net", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::ReceiveFailed(_)));
    }

    #[tokio::test]
    async fn join_room_returns_room_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/_matrix/client/v3/join/[^/]+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "room_id": "!new:envs.net"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let room = client(&server.uri()).join_room("!new:envs.net").await.unwrap();
        assert_eq!(room, "!new:envs.net");
    }

    #[tokio::test]
    async fn trailing_slash_in_homeserver_url_is_tolerated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/account/whoami"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "user_id": "@ribit.2.0:envs.net"
            })))
            .mount(&server)
            .await;

        let url = format!("{}/", server.uri());
        let who = client(&url).whoami().await.unwrap();
        assert_eq!(who.user_id, "@ribit.2.0:envs.net");
    }
}
