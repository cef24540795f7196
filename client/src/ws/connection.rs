//! Connection manager for the live attendance feed.
//!
//! Owns the transport lifecycle: opening the connection, subscribing,
//! answering keepalives, reconnecting with exponential backoff after an
//! unexpected close, and giving up after the configured number of attempts.
//! Failures never surface to callers; they are absorbed into
//! [`ConnectionState`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backoff::Backoff;
use super::config::WsConfig;
use super::error::WsError;
use super::messages::{InboundMessage, OutboundMessage};
use super::router::MessageRouter;
use super::state::ConnectionState;
use super::timer::ScheduledTask;
use super::transport::{Connector, TransportEvent, TransportLink, TungsteniteConnector};
use crate::metrics::FeedMetrics;
use crate::types::ClientIdentity;

/// Mutable connection bookkeeping, guarded by one lock.
#[derive(Debug)]
struct Session {
    /// Set by `disconnect`, cleared by `connect`.
    closed: bool,
    /// Bumped on every open; stale readers compare against it.
    generation: u64,
    backoff: Backoff,
    outbound: Option<mpsc::UnboundedSender<String>>,
    reader: Option<JoinHandle<()>>,
    reconnect: Option<ScheduledTask>,
}

struct Inner<C> {
    config: WsConfig,
    identity: ClientIdentity,
    connector: C,
    router: MessageRouter,
    metrics: Arc<FeedMetrics>,
    state: watch::Sender<ConnectionState>,
    session: Mutex<Session>,
}

/// Manages the live feed connection.
///
/// Cloning yields another handle to the same connection.
pub struct ConnectionManager<C = TungsteniteConnector> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for ConnectionManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("client_id", &self.inner.identity)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

impl ConnectionManager<TungsteniteConnector> {
    /// Creates a manager that connects over WebSocket.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: WsConfig) -> Result<Self, WsError> {
        Self::with_connector(config, TungsteniteConnector)
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates a manager that opens transports through `connector`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_connector(config: WsConfig, connector: C) -> Result<Self, WsError> {
        config.validate()?;

        let metrics = Arc::new(FeedMetrics::new());
        let (state, _) = watch::channel(ConnectionState::Idle);
        let session = Session {
            closed: false,
            generation: 0,
            backoff: Backoff::from_config(&config),
            outbound: None,
            reader: None,
            reconnect: None,
        };

        Ok(Self {
            inner: Arc::new(Inner {
                identity: ClientIdentity::generate(),
                router: MessageRouter::new(Arc::clone(&metrics)),
                config,
                connector,
                metrics,
                state,
                session: Mutex::new(session),
            }),
        })
    }

    /// Connects to the feed.
    ///
    /// Resolves once the connection is open, has given up, or was closed by
    /// [`disconnect`](Self::disconnect). Calling it while a connection is
    /// open or in progress does not open a second transport.
    pub async fn connect(&self) {
        let start = {
            let mut session = self.inner.lock_session();
            let current = *self.inner.state.borrow();
            match current {
                ConnectionState::Idle | ConnectionState::Closed | ConnectionState::GivenUp => {
                    session.closed = false;
                    session.backoff.reset();
                    self.inner.set_state(ConnectionState::Connecting);
                    true
                }
                ConnectionState::Connecting
                | ConnectionState::Open
                | ConnectionState::Reconnecting => false,
            }
        };

        if start {
            info!(client_id = %self.inner.identity, url = %self.inner.config.url, "Connecting to attendance feed");
            Arc::clone(&self.inner).attempt().await;
        }

        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|state| state.is_settled()).await;
    }

    /// Closes the connection and cancels any pending reconnection.
    ///
    /// Idempotent: repeated calls leave the state at `Closed` and publish the
    /// transition once.
    pub fn disconnect(&self) {
        let mut session = self.inner.lock_session();
        session.closed = true;

        if let Some(task) = session.reconnect.take() {
            task.cancel();
        }
        if let Some(reader) = session.reader.take() {
            reader.abort();
        }
        session.outbound = None;

        let changed = self.inner.state.send_if_modified(|state| {
            if *state == ConnectionState::Closed {
                false
            } else {
                *state = ConnectionState::Closed;
                true
            }
        });
        if changed {
            info!(client_id = %self.inner.identity, "Disconnected from attendance feed");
        }
    }

    /// Sends a message if the connection is open.
    ///
    /// Returns true if the frame was queued; otherwise the message is dropped.
    pub fn send(&self, msg: &OutboundMessage) -> bool {
        self.inner.send(msg)
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Returns true if the connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Returns a receiver that observes state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Returns the identity used in the connection URL.
    #[must_use]
    pub fn client_identity(&self) -> &ClientIdentity {
        &self.inner.identity
    }

    /// Returns reconnection attempts made since the last successful open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lock_session().backoff.attempts()
    }

    /// Returns the delay the next reconnection attempt would wait.
    #[must_use]
    pub fn current_backoff(&self) -> Duration {
        self.inner.lock_session().backoff.current_delay()
    }

    /// Returns the message router.
    #[must_use]
    pub fn router(&self) -> &MessageRouter {
        &self.inner.router
    }

    /// Returns the feed metrics.
    #[must_use]
    pub fn metrics(&self) -> &Arc<FeedMetrics> {
        &self.inner.metrics
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &WsConfig {
        &self.inner.config
    }
}

impl<C> Inner<C> {
    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Connection state changed");
        }
    }

    fn send(&self, msg: &OutboundMessage) -> bool {
        if *self.state.borrow() != ConnectionState::Open {
            debug!(message = msg.type_name(), "Not connected, dropping outbound message");
            return false;
        }

        let text = match serde_json::to_string(msg) {
            Ok(text) => text,
            Err(e) => {
                warn!(message = msg.type_name(), error = %e, "Failed to encode outbound message");
                return false;
            }
        };

        let session = self.lock_session();
        session
            .outbound
            .as_ref()
            .is_some_and(|outbound| outbound.send(text).is_ok())
    }
}

impl<C: Connector> Inner<C> {
    /// Runs one connection attempt and records its outcome.
    async fn attempt(self: Arc<Self>) {
        let result = match self.config.connection_url(&self.identity) {
            Ok(url) => {
                debug!(url = %url, "Opening transport");
                self.connector.connect(&url).await
            }
            Err(e) => Err(e),
        };

        let opened = {
            let mut session = self.lock_session();
            if session.closed {
                debug!("Discarding connection attempt after disconnect");
                return;
            }

            match result {
                Ok(link) => {
                    self.open(&mut session, link);
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Connection attempt failed");
                    self.schedule_reconnect(&mut session);
                    false
                }
            }
        };

        if opened {
            self.send(&OutboundMessage::subscribe(
                self.config.person_id.clone(),
                self.config.min_confidence,
            ));
        }
    }

    fn open(self: &Arc<Self>, session: &mut Session, link: TransportLink) {
        let TransportLink { outbound, inbound } = link;

        session.generation += 1;
        session.backoff.reset();
        session.outbound = Some(outbound);
        session.reconnect = None;

        let generation = session.generation;
        let reader = tokio::spawn(Self::read_loop(Arc::downgrade(self), inbound, generation));
        if let Some(previous) = session.reader.replace(reader) {
            previous.abort();
        }

        self.metrics.record_connection_opened();
        self.set_state(ConnectionState::Open);
        info!(client_id = %self.identity, generation, "Attendance feed connected");
    }

    /// Schedules the next reconnection attempt, or gives up.
    fn schedule_reconnect(self: &Arc<Self>, session: &mut Session) {
        if session.closed {
            return;
        }

        let Some((attempt, delay)) = session.backoff.next_attempt() else {
            self.metrics.record_give_up();
            self.set_state(ConnectionState::GivenUp);
            warn!(
                attempts = session.backoff.attempts(),
                "Reconnection attempts exhausted, giving up"
            );
            return;
        };

        self.metrics.record_reconnect_attempt();
        self.set_state(ConnectionState::Reconnecting);
        info!(
            attempt,
            max_attempts = session.backoff.max_attempts(),
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );

        let weak = Arc::downgrade(self);
        session.reconnect = Some(ScheduledTask::after(delay, async move {
            if let Some(inner) = weak.upgrade() {
                inner.attempt().await;
            }
        }));
    }

    async fn read_loop(
        weak: Weak<Self>,
        mut inbound: mpsc::UnboundedReceiver<TransportEvent>,
        generation: u64,
    ) {
        while let Some(event) = inbound.recv().await {
            let Some(inner) = weak.upgrade() else {
                return;
            };

            match event {
                TransportEvent::Frame(text) => inner.handle_frame(&text),
                TransportEvent::Closed(reason) => {
                    inner.on_transport_closed(generation, reason);
                    return;
                }
            }
        }

        if let Some(inner) = weak.upgrade() {
            inner.on_transport_closed(generation, None);
        }
    }

    fn handle_frame(&self, text: &str) {
        self.metrics.record_frame();

        match self.router.route(text) {
            Some(InboundMessage::Ping) => {
                self.send(&OutboundMessage::Pong);
            }
            Some(InboundMessage::Disconnecting { reason, .. }) => {
                info!(reason = reason.as_deref().unwrap_or("none"), "Server is closing the connection");
            }
            Some(InboundMessage::Error { code, message }) => {
                warn!(
                    code = code.as_deref().unwrap_or("none"),
                    message = message.as_deref().unwrap_or(""),
                    "Server reported an error"
                );
            }
            _ => {}
        }
    }

    fn on_transport_closed(self: &Arc<Self>, generation: u64, reason: Option<String>) {
        let mut session = self.lock_session();
        if session.closed || session.generation != generation {
            return;
        }

        session.outbound = None;
        session.reader = None;
        warn!(
            reason = reason.as_deref().unwrap_or("none"),
            "Attendance feed connection lost"
        );
        self.schedule_reconnect(&mut session);
    }
}

impl<C> Drop for Inner<C> {
    fn drop(&mut self) {
        let session = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = session.reconnect.take() {
            task.cancel();
        }
        if let Some(reader) = session.reader.take() {
            reader.abort();
        }
    }
}
