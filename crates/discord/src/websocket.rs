use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::events::InteractionEnvelope;
use crate::gateway::{GatewayEvent, GatewayTransport, TransportError};
use crate::payload::decode_interaction;

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

/// Sequence numbers start at 1, so zero stands for "none seen yet".
const NO_SEQUENCE: u64 = 0;

/// Close codes after which identifying again fails the same way: authentication failed,
/// invalid shard, sharding required, invalid API version, invalid intents, disallowed intents.
const FATAL_CLOSE_CODES: [u16; 6] = [4004, 4010, 4011, 4012, 4013, 4014];

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = Arc<Mutex<SplitSink<WsStream, Message>>>;

#[derive(Debug, Deserialize)]
struct GatewayFrame {
    op: u8,
    #[serde(default)]
    d: Value,
    s: Option<u64>,
    t: Option<String>,
}

#[derive(Debug, PartialEq)]
enum FrameAction {
    Hello { heartbeat_interval: Duration },
    Interaction(Box<InteractionEnvelope>),
    Ready { username: String },
    HeartbeatRequested,
    HeartbeatAcknowledged,
    SessionEnded(String),
    Ignore,
}

fn parse_frame(text: &str) -> Result<GatewayFrame, TransportError> {
    serde_json::from_str(text).map_err(|error| TransportError::Receive(error.to_string()))
}

fn classify(frame: GatewayFrame) -> FrameAction {
    match frame.op {
        OP_HELLO => match frame.d.get("heartbeat_interval").and_then(Value::as_u64) {
            Some(interval) => {
                FrameAction::Hello { heartbeat_interval: Duration::from_millis(interval) }
            }
            None => FrameAction::SessionEnded("hello without heartbeat interval".to_owned()),
        },
        OP_DISPATCH => match frame.t.as_deref() {
            Some("READY") => FrameAction::Ready {
                username: frame
                    .d
                    .pointer("/user/username")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_owned(),
            },
            Some("INTERACTION_CREATE") => match decode_interaction(frame.d) {
                Ok(envelope) => FrameAction::Interaction(Box::new(envelope)),
                Err(error) => {
                    warn!(
                        event_name = "ingress.discord.payload_rejected",
                        error = %error,
                        "dropping undecodable interaction"
                    );
                    FrameAction::Ignore
                }
            },
            _ => FrameAction::Ignore,
        },
        OP_HEARTBEAT => FrameAction::HeartbeatRequested,
        OP_HEARTBEAT_ACK => FrameAction::HeartbeatAcknowledged,
        OP_RECONNECT => FrameAction::SessionEnded("server requested reconnect".to_owned()),
        OP_INVALID_SESSION => FrameAction::SessionEnded("session invalidated".to_owned()),
        _ => FrameAction::Ignore,
    }
}

fn close_error(code: u16, reason: &str) -> TransportError {
    let detail = format!("closed by gateway: {code} {reason}");
    if FATAL_CLOSE_CODES.contains(&code) {
        TransportError::Rejected(detail)
    } else {
        TransportError::SessionEnded(detail)
    }
}

fn heartbeat_payload(sequence: u64) -> Value {
    let last = if sequence == NO_SEQUENCE { Value::Null } else { json!(sequence) };
    json!({ "op": OP_HEARTBEAT, "d": last })
}

fn identify_payload(token: &str, intents: u64) -> Value {
    json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token,
            "intents": intents,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "loa-bot",
                "device": "loa-bot"
            }
        }
    })
}

async fn send_json(sink: &WsSink, payload: &Value) -> Result<(), TransportError> {
    sink.lock()
        .await
        .send(Message::Text(payload.to_string()))
        .await
        .map_err(|error| TransportError::Send(error.to_string()))
}

struct Session {
    sink: WsSink,
    source: SplitStream<WsStream>,
    sequence: Arc<AtomicU64>,
    heartbeat: JoinHandle<()>,
}

/// Live connection to the Discord gateway. Every connect identifies afresh.
pub struct WebSocketGatewayTransport {
    url: String,
    token: SecretString,
    intents: u64,
    session: Mutex<Option<Session>>,
}

impl WebSocketGatewayTransport {
    pub fn new(url: impl Into<String>, token: SecretString, intents: u64) -> Self {
        Self { url: url.into(), token, intents, session: Mutex::new(None) }
    }

    async fn read_hello(source: &mut SplitStream<WsStream>) -> Result<Duration, TransportError> {
        while let Some(message) = source.next().await {
            let message = message.map_err(|error| TransportError::Connect(error.to_string()))?;
            let Message::Text(text) = message else {
                continue;
            };
            return match classify(parse_frame(&text)?) {
                FrameAction::Hello { heartbeat_interval } => Ok(heartbeat_interval),
                other => Err(TransportError::Connect(format!("expected hello, got {other:?}"))),
            };
        }

        Err(TransportError::Connect("gateway closed before hello".to_owned()))
    }

    fn spawn_heartbeat(
        sink: WsSink,
        sequence: Arc<AtomicU64>,
        interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let payload = heartbeat_payload(sequence.load(Ordering::Acquire));
                if let Err(error) = send_json(&sink, &payload).await {
                    warn!(
                        event_name = "system.gateway.heartbeat_failed",
                        error = %error,
                        "heartbeat send failed; stopping heartbeat"
                    );
                    return;
                }
                debug!(event_name = "system.gateway.heartbeat_sent", "sent heartbeat");
            }
        })
    }
}

#[async_trait]
impl GatewayTransport for WebSocketGatewayTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (sink, mut source) = stream.split();
        let sink: WsSink = Arc::new(Mutex::new(sink));

        let interval = Self::read_hello(&mut source).await?;
        send_json(&sink, &identify_payload(self.token.expose_secret(), self.intents)).await?;

        let sequence = Arc::new(AtomicU64::new(NO_SEQUENCE));
        let heartbeat = Self::spawn_heartbeat(sink.clone(), sequence.clone(), interval);
        info!(
            event_name = "system.gateway.identified",
            heartbeat_interval_ms = interval.as_millis() as u64,
            intents = self.intents,
            "identified with discord gateway"
        );

        let session = Session { sink, source, sequence, heartbeat };
        if let Some(previous) = self.session.lock().await.replace(session) {
            previous.heartbeat.abort();
        }
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<GatewayEvent>, TransportError> {
        let mut guard = self.session.lock().await;
        let session =
            guard.as_mut().ok_or_else(|| TransportError::Receive("not connected".to_owned()))?;

        loop {
            let message = match session.source.next().await {
                Some(Ok(message)) => message,
                Some(Err(error)) => return Err(TransportError::Receive(error.to_string())),
                None => return Err(TransportError::SessionEnded("stream ended".to_owned())),
            };

            let text = match message {
                Message::Text(text) => text,
                Message::Close(Some(frame)) => {
                    return Err(close_error(u16::from(frame.code), &frame.reason));
                }
                Message::Close(None) => {
                    return Err(TransportError::SessionEnded("closed without a frame".to_owned()));
                }
                _ => continue,
            };

            let frame = parse_frame(&text)?;
            if let Some(sequence) = frame.s {
                session.sequence.store(sequence, Ordering::Release);
            }

            match classify(frame) {
                FrameAction::Interaction(envelope) => {
                    return Ok(Some(GatewayEvent::Interaction(envelope)));
                }
                FrameAction::Ready { username } => {
                    info!(
                        event_name = "system.gateway.ready",
                        username = %username,
                        "logged in as {username}"
                    );
                    return Ok(Some(GatewayEvent::Ready));
                }
                FrameAction::HeartbeatRequested => {
                    let payload = heartbeat_payload(session.sequence.load(Ordering::Acquire));
                    send_json(&session.sink, &payload).await?;
                }
                FrameAction::HeartbeatAcknowledged => {
                    debug!(event_name = "system.gateway.heartbeat_ack", "heartbeat acknowledged");
                }
                FrameAction::SessionEnded(reason) => {
                    return Err(TransportError::SessionEnded(reason));
                }
                FrameAction::Hello { .. } | FrameAction::Ignore => {}
            }
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };
        session.heartbeat.abort();

        let mut sink = session.sink.lock().await;
        sink.close().await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}
