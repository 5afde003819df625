use std::{
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::events::{EventContext, EventDispatcher, HandlerResult, InteractionEnvelope};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("gateway failed to connect: {0}")]
    Connect(String),
    #[error("gateway read failed: {0}")]
    Receive(String),
    #[error("gateway write failed: {0}")]
    Send(String),
    #[error("gateway session ended: {0}")]
    SessionEnded(String),
    /// Discord refused the session (bad token, bad intents). Reconnecting cannot help.
    #[error("gateway rejected the session: {0}")]
    Rejected(String),
    #[error("gateway disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("gateway gave up after {attempts} consecutive failures: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: TransportError },
    #[error("gateway stopped without retrying: {0}")]
    Fatal(TransportError),
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
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[derive(Debug, PartialEq)]
pub enum GatewayEvent {
    /// The gateway accepted the identify; the session is live from here on.
    Ready,
    Interaction(Box<InteractionEnvelope>),
}

#[async_trait]
pub trait GatewayTransport: Send + Sync {
    /// Opens the socket and identifies. Success does not mean Discord accepted the session.
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the stream closed cleanly and the runner should stop.
    async fn next_event(&self) -> Result<Option<GatewayEvent>, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Whether a gateway session is currently live. Shared with the health probe.
#[derive(Debug, Default)]
pub struct GatewayStatus {
    connected: AtomicBool,
}

impl GatewayStatus {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn mark_connected(&self) {
        self.connected.store(true, Ordering::Release);
    }

    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

struct SessionFailure {
    established: bool,
    error: TransportError,
}

pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
    status: Arc<GatewayStatus>,
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
        status: Arc<GatewayStatus>,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy, status }
    }

    pub fn status(&self) -> Arc<GatewayStatus> {
        self.status.clone()
    }

    /// Runs sessions until the stream closes cleanly, Discord rejects the session, or
    /// `max_retries` consecutive sessions fail before READY.
    pub async fn start(&self) -> Result<(), GatewayError> {
        let mut attempt = 0_u32;

        loop {
            let failure = match self.run_session(attempt).await {
                Ok(()) => return Ok(()),
                Err(failure) => failure,
            };
            self.status.mark_disconnected();

            warn!(
                event_name = "system.gateway.session_failed",
                attempt,
                established = failure.established,
                max_retries = self.reconnect_policy.max_retries,
                error = %failure.error,
                "gateway session failed"
            );

            if let TransportError::Rejected(_) = failure.error {
                error!(
                    event_name = "system.gateway.rejected",
                    error = %failure.error,
                    "gateway rejected the session; not reconnecting"
                );
                return Err(GatewayError::Fatal(failure.error));
            }

            // Only a session that reached READY starts a fresh retry budget.
            if failure.established {
                attempt = 0;
                self.pause(attempt).await;
                continue;
            }

            if attempt >= self.reconnect_policy.max_retries {
                warn!(
                    event_name = "system.gateway.retries_exhausted",
                    max_retries = self.reconnect_policy.max_retries,
                    "gateway retries exhausted; interaction handling stopped"
                );
                return Err(GatewayError::RetriesExhausted {
                    attempts: attempt + 1,
                    last_error: failure.error,
                });
            }

            self.pause(attempt).await;
            attempt += 1;
        }
    }

    async fn pause(&self, attempt: u32) {
        let delay = self.reconnect_policy.backoff(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    async fn run_session(&self, attempt: u32) -> Result<(), SessionFailure> {
        info!(event_name = "system.gateway.connecting", attempt, "opening gateway connection");
        self.transport
            .connect()
            .await
            .map_err(|error| SessionFailure { established: false, error })?;
        info!(event_name = "system.gateway.connected", attempt, "gateway connected");

        let mut established = false;
        loop {
            let event = self
                .transport
                .next_event()
                .await
                .map_err(|error| SessionFailure { established, error })?;

            match event {
                Some(GatewayEvent::Ready) => {
                    established = true;
                    self.status.mark_connected();
                }
                Some(GatewayEvent::Interaction(envelope)) => self.dispatch(&envelope).await,
                None => {
                    info!(event_name = "system.gateway.closed", attempt, "gateway stream closed");
                    self.status.mark_disconnected();
                    self.transport
                        .disconnect()
                        .await
                        .map_err(|error| SessionFailure { established, error })?;
                    return Ok(());
                }
            }
        }
    }

    async fn dispatch(&self, envelope: &InteractionEnvelope) {
        info!(
            event_name = "ingress.discord.interaction_received",
            correlation_id = %envelope.interaction_id,
            guild_id = envelope.guild_id.as_deref().unwrap_or("none"),
            user_id = %envelope.actor.user_id,
            kind = ?envelope.event.kind(),
            "received discord interaction"
        );

        let context = EventContext { correlation_id: envelope.interaction_id.clone() };
        match self.dispatcher.dispatch(envelope, &context).await {
            Ok(HandlerResult::Handled(outcome)) => {
                debug!(correlation_id = %envelope.interaction_id, ?outcome, "interaction handled");
            }
            Ok(HandlerResult::Ignored) => {
                debug!(correlation_id = %envelope.interaction_id, "interaction ignored");
            }
            Err(error) => {
                warn!(
                    correlation_id = %envelope.interaction_id,
                    guild_id = envelope.guild_id.as_deref().unwrap_or("none"),
                    user_id = %envelope.actor.user_id,
                    disposition = ?error.disposition(),
                    error = %error,
                    "interaction dispatch failed; continuing gateway loop"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{
        GatewayError, GatewayEvent, GatewayRunner, GatewayStatus, GatewayTransport,
        ReconnectPolicy, TransportError,
    };
    use crate::events::{
        Actor, EventContext, EventDispatcher, EventHandler, EventHandlerError, HandlerResult,
        InteractionEnvelope, InteractionEvent, InteractionKind,
    };

    type ScriptedEvent = Result<Option<GatewayEvent>, TransportError>;

    /// Empty scripts connect and then close cleanly.
    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        events: VecDeque<ScriptedEvent>,
        connect_attempts: usize,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            events: Vec<ScriptedEvent>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    events: events.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn disconnect_calls(&self) -> usize {
            self.state.lock().await.disconnect_calls
        }
    }

    #[async_trait]
    impl GatewayTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_event(&self) -> Result<Option<GatewayEvent>, TransportError> {
            let mut state = self.state.lock().await;
            state.events.pop_front().unwrap_or(Ok(None))
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.disconnect_calls += 1;
            Ok(())
        }
    }

    struct CountingCommandHandler {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventHandler for CountingCommandHandler {
        fn kind(&self) -> InteractionKind {
            InteractionKind::Command
        }

        async fn handle(
            &self,
            envelope: &InteractionEnvelope,
            ctx: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            self.seen.lock().await.push(ctx.correlation_id.clone());
            if envelope.interaction_id == "boom" {
                return Err(EventHandlerError::Api(crate::api::ApiError::Transport(
                    "reset".to_owned(),
                )));
            }
            Ok(HandlerResult::Ignored)
        }
    }

    struct StatusRecordingHandler {
        status: Arc<GatewayStatus>,
        seen: Arc<Mutex<Vec<bool>>>,
    }

    #[async_trait]
    impl EventHandler for StatusRecordingHandler {
        fn kind(&self) -> InteractionKind {
            InteractionKind::Command
        }

        async fn handle(
            &self,
            _envelope: &InteractionEnvelope,
            _ctx: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            self.seen.lock().await.push(self.status.is_connected());
            Ok(HandlerResult::Ignored)
        }
    }

    fn command(id: &str) -> InteractionEnvelope {
        InteractionEnvelope {
            interaction_id: id.to_owned(),
            token: "tok".to_owned(),
            guild_id: Some("g".to_owned()),
            channel_id: Some("c".to_owned()),
            actor: Actor::default(),
            event: InteractionEvent::Command { name: "postloa".to_owned() },
        }
    }

    fn ready() -> ScriptedEvent {
        Ok(Some(GatewayEvent::Ready))
    }

    fn interaction(id: &str) -> ScriptedEvent {
        Ok(Some(GatewayEvent::Interaction(Box::new(command(id)))))
    }

    fn instant_policy(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![ready(), interaction("i-1"), Ok(None)],
        ));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(CountingCommandHandler { seen: seen.clone() });

        let runner = GatewayRunner::new(
            transport.clone(),
            dispatcher,
            instant_policy(2),
            Arc::new(GatewayStatus::default()),
        );

        runner.start().await.expect("clean close");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.disconnect_calls().await, 1);
        assert_eq!(*seen.lock().await, vec!["i-1"]);
    }

    #[tokio::test]
    async fn exhausts_retries_without_panicking() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));
        let status = Arc::new(GatewayStatus::default());

        let runner = GatewayRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            instant_policy(2),
            status.clone(),
        );

        let error = runner.start().await.expect_err("retries exhausted");
        assert_eq!(
            error,
            GatewayError::RetriesExhausted {
                attempts: 3,
                last_error: TransportError::Connect("fail-3".to_owned()),
            }
        );
        assert_eq!(transport.connect_attempts().await, 3);
        assert!(!status.is_connected());
    }

    #[tokio::test]
    async fn sessions_closing_before_ready_exhaust_retries() {
        let closed = || -> ScriptedEvent {
            Err(TransportError::SessionEnded("closed by gateway: 4000 unknown error".to_owned()))
        };
        let transport =
            Arc::new(ScriptedTransport::with_script(vec![], (0..50).map(|_| closed()).collect()));
        let status = Arc::new(GatewayStatus::default());

        let runner = GatewayRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            instant_policy(5),
            status.clone(),
        );

        let error = runner.start().await.expect_err("identify never accepted");
        assert!(matches!(error, GatewayError::RetriesExhausted { attempts: 6, .. }), "{error:?}");
        assert_eq!(transport.connect_attempts().await, 6);
        assert!(!status.is_connected());
    }

    #[tokio::test]
    async fn rejected_session_stops_without_reconnecting() {
        let rejected =
            TransportError::Rejected("closed by gateway: 4004 Authentication failed".to_owned());
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![Err(rejected.clone()), ready(), Ok(None)],
        ));

        let runner = GatewayRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            instant_policy(5),
            Arc::new(GatewayStatus::default()),
        );

        assert_eq!(runner.start().await, Err(GatewayError::Fatal(rejected)));
        assert_eq!(transport.connect_attempts().await, 1);
    }

    #[tokio::test]
    async fn established_session_resets_retry_budget() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("first".to_owned())),
                Ok(()),
                Err(TransportError::Connect("third".to_owned())),
                Ok(()),
            ],
            vec![
                ready(),
                Err(TransportError::SessionEnded("reconnect requested".to_owned())),
                Ok(None),
            ],
        ));

        let runner = GatewayRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            instant_policy(1),
            Arc::new(GatewayStatus::default()),
        );

        runner.start().await.expect("budget reset after live session");
        assert_eq!(transport.connect_attempts().await, 4);
    }

    #[tokio::test]
    async fn dispatch_errors_do_not_end_the_session() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![ready(), interaction("boom"), interaction("i-2"), Ok(None)],
        ));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(CountingCommandHandler { seen: seen.clone() });

        let runner = GatewayRunner::new(
            transport.clone(),
            dispatcher,
            instant_policy(0),
            Arc::new(GatewayStatus::default()),
        );

        runner.start().await.expect("clean close");
        assert_eq!(*seen.lock().await, vec!["boom", "i-2"]);
        assert_eq!(transport.connect_attempts().await, 1);
    }

    #[tokio::test]
    async fn status_is_live_only_between_ready_and_close() {
        let status = Arc::new(GatewayStatus::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(StatusRecordingHandler { status: status.clone(), seen: seen.clone() });
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![interaction("early"), ready(), interaction("late"), Ok(None)],
        ));

        let runner =
            GatewayRunner::new(transport, dispatcher, ReconnectPolicy::default(), status.clone());
        runner.start().await.expect("clean close");

        assert_eq!(*seen.lock().await, vec![false, true]);
        assert!(!status.is_connected(), "closed stream marks the session down");
        assert!(!runner.status().is_connected());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.backoff(0).as_millis(), 250);
        assert_eq!(policy.backoff(1).as_millis(), 500);
        assert_eq!(policy.backoff(3).as_millis(), 2_000);
        assert_eq!(policy.backoff(10).as_millis(), 5_000);
    }
}
