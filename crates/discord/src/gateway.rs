use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use dividy_core::config::{DiscordConfig, GatewayConfig};

use crate::events::{
    EventContext, EventDispatcher, GatewayEnvelope, GatewayEvent, Interaction, ReadyEvent,
};

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
    #[error("gateway requested a reconnect")]
    ReconnectRequested,
    #[error("gateway invalidated the session (resumable: {resumable})")]
    InvalidSession { resumable: bool },
    #[error("gateway missed a heartbeat acknowledgement")]
    MissedHeartbeatAck,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopGatewayTransport;

#[async_trait]
impl GatewayTransport for NoopGatewayTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError> {
        Ok(None)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "gateway transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "gateway retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening gateway connection");
        self.transport.connect().await?;
        info!(attempt, "gateway connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "gateway stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            let context = EventContext::for_envelope(&envelope);
            info!(
                event_name = "ingress.discord.envelope_received",
                sequence = ?envelope.sequence,
                event_type = ?envelope.event.event_type(),
                correlation_id = %context.correlation_id,
                "received gateway envelope"
            );

            if let Err(error) = self.dispatcher.dispatch(&envelope, &context).await {
                warn!(
                    correlation_id = %context.correlation_id,
                    event_type = ?envelope.event.event_type(),
                    error = %error,
                    "event dispatch failed; continuing gateway loop"
                );
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GatewayFrame {
    op: u8,
    #[serde(default)]
    d: serde_json::Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct HeartbeatState {
    interval: Duration,
    next_beat_at: Instant,
    awaiting_ack: bool,
}

struct ConnectionState {
    stream: WsStream,
    heartbeat: HeartbeatState,
    last_sequence: Option<u64>,
}

enum PumpStep {
    HeartbeatDue,
    Frame(Option<Result<tungstenite::Message, tungstenite::Error>>),
}

/// Live gateway transport: HELLO/IDENTIFY handshake, heartbeat upkeep, and
/// dispatch decoding. Every reconnect performs a fresh identify.
pub struct WebSocketGateway {
    url: String,
    bot_token: SecretString,
    connection: Mutex<Option<ConnectionState>>,
}

impl WebSocketGateway {
    pub fn new(url: impl Into<String>, bot_token: SecretString) -> Self {
        Self { url: url.into(), bot_token, connection: Mutex::new(None) }
    }

    pub fn from_config(gateway: &GatewayConfig, discord: &DiscordConfig) -> Self {
        Self::new(gateway.url.clone(), discord.bot_token.clone())
    }
}

#[async_trait]
impl GatewayTransport for WebSocketGateway {
    async fn connect(&self) -> Result<(), TransportError> {
        let (mut stream, _response) = connect_async(&self.url)
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        let heartbeat_interval = read_hello(&mut stream).await?;
        send_json(&mut stream, &identify_payload(self.bot_token.expose_secret())).await?;
        info!(
            event_name = "ingress.discord.identify_sent",
            heartbeat_interval_ms = heartbeat_interval.as_millis() as u64,
            "gateway handshake complete"
        );

        let heartbeat = HeartbeatState {
            interval: heartbeat_interval,
            next_beat_at: Instant::now() + heartbeat_interval,
            awaiting_ack: false,
        };

        *self.connection.lock().await =
            Some(ConnectionState { stream, heartbeat, last_sequence: None });
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError> {
        let mut guard = self.connection.lock().await;
        let Some(mut connection) = guard.take() else {
            return Err(TransportError::Receive("gateway is not connected".to_owned()));
        };

        loop {
            let step = tokio::select! {
                _ = tokio::time::sleep_until(connection.heartbeat.next_beat_at) => {
                    PumpStep::HeartbeatDue
                }
                frame = connection.stream.next() => PumpStep::Frame(frame),
            };

            match step {
                PumpStep::HeartbeatDue => {
                    // The previous beat was never acknowledged; the connection
                    // is a zombie and must be rebuilt.
                    if connection.heartbeat.awaiting_ack {
                        return Err(TransportError::MissedHeartbeatAck);
                    }
                    send_heartbeat(&mut connection).await?;
                }
                PumpStep::Frame(None) => return Ok(None),
                PumpStep::Frame(Some(Err(error))) => {
                    return Err(TransportError::Receive(error.to_string()));
                }
                PumpStep::Frame(Some(Ok(tungstenite::Message::Close(close)))) => {
                    let detail = match close {
                        Some(frame) => {
                            format!("code {} reason {}", u16::from(frame.code), frame.reason)
                        }
                        None => "no close frame".to_owned(),
                    };
                    return Err(TransportError::Receive(format!("gateway closed: {detail}")));
                }
                PumpStep::Frame(Some(Ok(tungstenite::Message::Text(text)))) => {
                    let frame: GatewayFrame = match serde_json::from_str(&text) {
                        Ok(frame) => frame,
                        Err(error) => {
                            warn!(error = %error, "skipping undecodable gateway frame");
                            continue;
                        }
                    };

                    match frame.op {
                        OP_DISPATCH => {
                            if frame.s.is_some() {
                                connection.last_sequence = frame.s;
                            }
                            let event_type = frame.t.as_deref().unwrap_or_default();
                            let event = map_dispatch_event(event_type, frame.d);
                            let envelope = GatewayEnvelope { sequence: frame.s, event };
                            *guard = Some(connection);
                            return Ok(Some(envelope));
                        }
                        OP_HEARTBEAT => send_heartbeat(&mut connection).await?,
                        OP_HEARTBEAT_ACK => {
                            connection.heartbeat.awaiting_ack = false;
                            debug!(
                                event_name = "ingress.discord.heartbeat_ack",
                                "heartbeat acknowledged"
                            );
                        }
                        OP_RECONNECT => return Err(TransportError::ReconnectRequested),
                        OP_INVALID_SESSION => {
                            let resumable = frame.d.as_bool().unwrap_or(false);
                            return Err(TransportError::InvalidSession { resumable });
                        }
                        OP_HELLO => {
                            debug!("ignoring repeated hello frame");
                        }
                        other => {
                            debug!(op = other, "ignoring unsupported gateway opcode");
                        }
                    }
                }
                // Control and binary frames carry nothing for us; pings are
                // answered by the websocket layer while the stream is polled.
                PumpStep::Frame(Some(Ok(_))) => {}
            }
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut guard = self.connection.lock().await;
        if let Some(mut connection) = guard.take() {
            connection
                .stream
                .close(None)
                .await
                .map_err(|error| TransportError::Disconnect(error.to_string()))?;
        }
        Ok(())
    }
}

async fn read_hello(stream: &mut WsStream) -> Result<Duration, TransportError> {
    loop {
        let message = stream
            .next()
            .await
            .ok_or_else(|| TransportError::Connect("gateway closed before hello".to_owned()))?
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        let tungstenite::Message::Text(text) = message else {
            continue;
        };
        let frame: GatewayFrame = serde_json::from_str(&text)
            .map_err(|error| TransportError::Connect(format!("invalid hello frame: {error}")))?;
        if frame.op != OP_HELLO {
            continue;
        }

        let interval_ms = frame
            .d
            .get("heartbeat_interval")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| {
                TransportError::Connect("hello frame is missing heartbeat_interval".to_owned())
            })?;
        return Ok(Duration::from_millis(interval_ms));
    }
}

fn identify_payload(token: &str) -> serde_json::Value {
    json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token,
            // Interaction dispatches are not gated behind gateway intents.
            "intents": 0,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "dividy",
                "device": "dividy",
            },
        },
    })
}

async fn send_json(
    stream: &mut WsStream,
    payload: &serde_json::Value,
) -> Result<(), TransportError> {
    stream
        .send(tungstenite::Message::Text(payload.to_string()))
        .await
        .map_err(|error| TransportError::Send(error.to_string()))
}

async fn send_heartbeat(connection: &mut ConnectionState) -> Result<(), TransportError> {
    let payload = json!({ "op": OP_HEARTBEAT, "d": connection.last_sequence });
    send_json(&mut connection.stream, &payload).await?;
    connection.heartbeat.awaiting_ack = true;
    connection.heartbeat.next_beat_at = Instant::now() + connection.heartbeat.interval;
    debug!(
        event_name = "ingress.discord.heartbeat_sent",
        sequence = ?connection.last_sequence,
        "heartbeat sent"
    );
    Ok(())
}

fn map_dispatch_event(event_type: &str, data: serde_json::Value) -> GatewayEvent {
    match event_type {
        "READY" => match serde_json::from_value::<ReadyEvent>(data) {
            Ok(ready) => GatewayEvent::Ready(ready),
            Err(error) => {
                warn!(error = %error, "failed to decode READY payload");
                GatewayEvent::Unsupported { event_type: event_type.to_owned() }
            }
        },
        "INTERACTION_CREATE" => match serde_json::from_value::<Interaction>(data) {
            Ok(interaction) => GatewayEvent::InteractionCreate(interaction),
            Err(error) => {
                warn!(error = %error, "failed to decode INTERACTION_CREATE payload");
                GatewayEvent::Unsupported { event_type: event_type.to_owned() }
            }
        },
        other => GatewayEvent::Unsupported { event_type: other.to_owned() },
    }
}
