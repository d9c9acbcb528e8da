//! Slack Socket Mode Event Source
//!
//! Opens a Socket Mode websocket, acknowledges every envelope, and forwards
//! channel messages to the dispatch loop as [`InboundMessage`]s. Reconnects after
//! a fixed delay when Slack asks for it or the socket drops.

use super::slack::DEFAULT_SLACK_API_BASE;
use super::traits::{ChannelError, InboundMessage};
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

/// Message subtypes that never carry a fresh human message
const IGNORED_SUBTYPES: &[&str] = &["message_changed", "message_deleted", "message_replied"];

#[derive(Debug, Clone, Deserialize)]
struct SocketEnvelope {
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct OpenConnectionResponse {
    ok: bool,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// How a socket session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Slack closed or asked us to reconnect
    Reconnect,
    /// The dispatch loop hung up
    ReceiverClosed,
}

/// Socket Mode client
pub struct SlackSocket {
    app_token: String,
    api_base: String,
    client: reqwest::Client,
    reconnect_delay: Duration,
}

impl SlackSocket {
    pub fn new(app_token: &str) -> Self {
        Self {
            app_token: app_token.trim().to_string(),
            api_base: DEFAULT_SLACK_API_BASE.to_string(),
            client: reqwest::Client::new(),
            reconnect_delay: Duration::from_secs(5),
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Ask Slack for a fresh websocket URL
    pub async fn open_connection(&self) -> Result<String, ChannelError> {
        let response = self
            .client
            .post(format!("{}/apps.connections.open", self.api_base))
            .bearer_auth(&self.app_token)
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        let body: OpenConnectionResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::Internal(e.to_string()))?;

        if !body.ok {
            return Err(ChannelError::api(
                "apps.connections.open",
                body.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        body.url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ChannelError::api("apps.connections.open", "missing url"))
    }

    /// Run until the receiving side of `events` is dropped
    pub async fn run(&self, events: mpsc::Sender<InboundMessage>) -> Result<()> {
        loop {
            match self.open_connection().await {
                Ok(url) => {
                    info!("Connecting to Slack with Socket Mode...");
                    match self.run_session(&url, &events).await {
                        Ok(SessionEnd::ReceiverClosed) => {
                            info!("Dispatch loop closed, stopping socket client");
                            return Ok(());
                        }
                        Ok(SessionEnd::Reconnect) => info!("Slack requested reconnect"),
                        Err(e) => warn!("Socket session error: {:#}", e),
                    }
                }
                Err(e) => warn!("Connection failed. Retrying later... ({})", e),
            }

            if events.is_closed() {
                return Ok(());
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn run_session(
        &self,
        url: &str,
        events: &mpsc::Sender<InboundMessage>,
    ) -> Result<SessionEnd> {
        let (stream, _response) = connect_async(url)
            .await
            .context("failed to connect slack socket mode websocket")?;
        let (mut sink, mut source) = stream.split();
        info!("Connected to Slack with Socket Mode.");

        while let Some(frame) = source.next().await {
            let frame = frame.context("failed reading slack websocket message")?;
            let Some(envelope) = parse_socket_envelope(frame)? else {
                continue;
            };

            if let Some(envelope_id) = envelope.envelope_id.as_deref() {
                let ack = json!({ "envelope_id": envelope_id }).to_string();
                sink.send(WsMessage::Text(ack.into()))
                    .await
                    .context("failed to send slack socket ack")?;
            }

            match envelope.envelope_type.as_str() {
                "hello" => debug!("Socket Mode hello received"),
                "disconnect" => return Ok(SessionEnd::Reconnect),
                "events_api" => {
                    if let Some(message) = normalize_event(&envelope.payload) {
                        if events.send(message).await.is_err() {
                            return Ok(SessionEnd::ReceiverClosed);
                        }
                    }
                }
                other => debug!("Ignoring socket envelope type {}", other),
            }
        }

        Ok(SessionEnd::Reconnect)
    }
}

fn parse_socket_envelope(message: WsMessage) -> Result<Option<SocketEnvelope>> {
    match message {
        WsMessage::Text(text) => {
            let envelope = serde_json::from_str::<SocketEnvelope>(&text)
                .context("failed to parse slack socket envelope")?;
            Ok(Some(envelope))
        }
        WsMessage::Binary(bytes) => {
            let text =
                String::from_utf8(bytes.to_vec()).context("invalid utf-8 slack socket payload")?;
            let envelope = serde_json::from_str::<SocketEnvelope>(&text)
                .context("failed to parse slack socket envelope")?;
            Ok(Some(envelope))
        }
        WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Close(_) | WsMessage::Frame(_) => {
            Ok(None)
        }
    }
}

/// Convert an `events_api` payload into an inbound message, if it is one
pub fn normalize_event(payload: &Value) -> Option<InboundMessage> {
    if payload.get("type").and_then(Value::as_str) != Some("event_callback") {
        return None;
    }

    let event = payload.get("event")?;
    if event.get("type").and_then(Value::as_str) != Some("message") {
        return None;
    }
    if let Some(subtype) = event.get("subtype").and_then(Value::as_str) {
        if IGNORED_SUBTYPES.contains(&subtype) {
            return None;
        }
    }

    let field = |name: &str| {
        event
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let author_id = field("user")?;
    let channel_id = field("channel")?;
    let ts = field("ts")?;
    let text = event.get("text").and_then(Value::as_str).unwrap_or_default();

    Some(InboundMessage::new(author_id, ts, text, channel_id))
}
