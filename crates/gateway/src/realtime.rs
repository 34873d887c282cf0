//! WebSocket subscriber for the platform's change stream.
//!
//! [`RealtimeClient`] connects to the platform's realtime endpoint, joins
//! one channel per watched collection, decodes incoming change frames, and
//! publishes them into a [`ChangeFeed`]. [`run`] keeps the connection alive
//! with exponential-backoff reconnection until its [`CancellationToken`]
//! fires; after every reconnect the local views are expected to refetch,
//! which heals whatever the gap dropped.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use skypanel_events::{ChangeEvent, ChangeFeed, ChangeKind};

use crate::error::GatewayError;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// One channel to join on connect: a collection, optionally narrowed by a
/// server-side filter expression such as `assigned_technician_id=eq.7`.
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub collection: String,
    pub filter: Option<String>,
}

impl ChannelSpec {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filter: None,
        }
    }

    pub fn filtered(name: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filter: Some(filter.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire frames
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct JoinFrame<'a> {
    topic: String,
    event: &'static str,
    #[serde(rename = "ref")]
    reference: String,
    payload: JoinPayload<'a>,
}

#[derive(Debug, Serialize)]
struct JoinPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a str>,
}

/// An incoming change frame. Frames with other `event` values (heartbeat
/// replies, join acks) decode with `payload` fields missing and are skipped.
#[derive(Debug, Deserialize)]
struct ChangeFrame {
    topic: String,
    event: String,
    #[serde(default)]
    payload: ChangePayload,
}

#[derive(Debug, Default, Deserialize)]
struct ChangePayload {
    #[serde(rename = "type")]
    kind: Option<ChangeKind>,
    record: Option<Value>,
    old_record: Option<Value>,
}

/// Decode one text frame into a change event, if it is one.
fn decode_frame(text: &str) -> Result<Option<ChangeEvent>, GatewayError> {
    let frame: ChangeFrame = serde_json::from_str(text)?;
    if frame.event != "postgres_changes" {
        return Ok(None);
    }
    let Some(kind) = frame.payload.kind else {
        return Ok(None);
    };
    let row = match kind {
        ChangeKind::Delete => frame.payload.old_record,
        ChangeKind::Insert | ChangeKind::Update => frame.payload.record,
    };
    let Some(row) = row else {
        return Ok(None);
    };

    let collection = frame
        .topic
        .strip_prefix("realtime:")
        .unwrap_or(&frame.topic)
        .to_string();
    Ok(Some(ChangeEvent::new(collection, kind, row)))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Connection configuration for the realtime endpoint.
pub struct RealtimeClient {
    ws_url: String,
    api_key: String,
    channels: Vec<ChannelSpec>,
}

impl RealtimeClient {
    pub fn new(ws_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            api_key: api_key.into(),
            channels: Vec::new(),
        }
    }

    /// Add a channel to join on every (re)connect.
    pub fn watch(mut self, channel: ChannelSpec) -> Self {
        self.channels.push(channel);
        self
    }

    /// Connect and join all configured channels.
    async fn connect(&self) -> Result<WsStream, GatewayError> {
        let url = format!("{}/realtime/v1/websocket?apikey={}", self.ws_url, self.api_key);
        let (mut stream, _response) = connect_async(&url)
            .await
            .map_err(|e| GatewayError::Transport(format!("Realtime connect failed: {e}")))?;

        for channel in &self.channels {
            let frame = JoinFrame {
                topic: format!("realtime:{}", channel.collection),
                event: "phx_join",
                reference: Uuid::new_v4().to_string(),
                payload: JoinPayload {
                    filter: channel.filter.as_deref(),
                },
            };
            let text = serde_json::to_string(&frame)?;
            stream
                .send(Message::Text(text))
                .await
                .map_err(|e| GatewayError::Transport(format!("Channel join failed: {e}")))?;
        }

        tracing::info!(channels = self.channels.len(), "Realtime connection established");
        Ok(stream)
    }

    /// Read frames until the connection drops, publishing decoded change
    /// events into `feed`.
    async fn pump(&self, mut stream: WsStream, feed: &ChangeFeed, cancel: &CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => match decode_frame(&text) {
                            Ok(Some(event)) => feed.publish(event),
                            Ok(None) => {}
                            Err(e) => {
                                tracing::warn!(error = %e, "Undecodable realtime frame");
                            }
                        },
                        Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => {}
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::warn!("Realtime connection closed");
                            return;
                        }
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "Realtime read error");
                            return;
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reconnection
// ---------------------------------------------------------------------------

/// Tunable parameters for the exponential-backoff strategy.
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay, clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Drive the realtime connection until `cancel` fires.
///
/// Each successful connection resets the backoff; each failure or drop
/// sleeps the current delay before retrying.
pub async fn run(
    client: RealtimeClient,
    feed: ChangeFeed,
    config: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return;
        }
        attempt += 1;

        tokio::select! {
            _ = cancel.cancelled() => return,
            result = client.connect() => {
                match result {
                    Ok(stream) => {
                        attempt = 0;
                        delay = config.initial_delay;
                        client.pump(stream, &feed, &cancel).await;
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "Realtime connect attempt {attempt} failed",
                        );
                    }
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = next_delay(delay, &config);
    }
}

/// Spawn [`run`] on the current runtime.
pub fn spawn(
    client: RealtimeClient,
    feed: ChangeFeed,
    config: ReconnectConfig,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(client, feed, config, cancel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn next_delay_doubles() {
        let config = ReconnectConfig::default();
        assert_eq!(next_delay(Duration::from_secs(1), &config), Duration::from_secs(2));
    }

    #[test]
    fn next_delay_clamps_at_max() {
        let config = ReconnectConfig {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(next_delay(Duration::from_secs(8), &config), Duration::from_secs(10));
    }

    #[test]
    fn full_backoff_sequence() {
        let config = ReconnectConfig::default();
        let mut delay = config.initial_delay;
        let expected = [1, 2, 4, 8, 16, 30, 30];

        for &expected_secs in &expected {
            assert_eq!(delay.as_secs(), expected_secs);
            delay = next_delay(delay, &config);
        }
    }

    #[test]
    fn decodes_update_frame() {
        let text = json!({
            "topic": "realtime:works",
            "event": "postgres_changes",
            "payload": {
                "type": "UPDATE",
                "record": {"id": 42, "status": "IN_PROGRESS"},
            }
        })
        .to_string();

        let event = decode_frame(&text).unwrap().expect("change event");
        assert_eq!(event.collection, "works");
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.row["id"], 42);
    }

    #[test]
    fn delete_frame_carries_old_record() {
        let text = json!({
            "topic": "realtime:chat_messages",
            "event": "postgres_changes",
            "payload": {
                "type": "DELETE",
                "old_record": {"id": 9},
            }
        })
        .to_string();

        let event = decode_frame(&text).unwrap().unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        assert_eq!(event.row["id"], 9);
    }

    #[test]
    fn non_change_frames_are_skipped() {
        let heartbeat = json!({
            "topic": "phoenix",
            "event": "phx_reply",
            "payload": {}
        })
        .to_string();
        assert!(decode_frame(&heartbeat).unwrap().is_none());
    }

    #[test]
    fn change_frame_without_record_is_skipped() {
        let text = json!({
            "topic": "realtime:works",
            "event": "postgres_changes",
            "payload": {"type": "UPDATE"}
        })
        .to_string();
        assert!(decode_frame(&text).unwrap().is_none());
    }

    #[tokio::test]
    async fn cancelled_run_returns_without_connecting() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let client = RealtimeClient::new("ws://localhost:1", "key")
            .watch(ChannelSpec::collection("works"));
        run(client, ChangeFeed::default(), ReconnectConfig::default(), cancel).await;
    }
}
