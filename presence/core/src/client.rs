//! Rich Presence Client
//!
//! [`RichClient`] drives one connection to the desktop client through its
//! lifecycle:
//!
//! ```text
//! Disconnected --connect--> Connected --ack--> HandshakeComplete
//!      ^                        |                     |
//!      +------ shutdown / peer close / broken pipe ---+
//! ```
//!
//! # Design
//!
//! - A background task is the only reader of the connection. It handles
//!   the handshake acknowledgement, command responses, pings and remote
//!   close.
//! - Session state, the cached activity, the pending update timer and the
//!   reader handle live behind one `parking_lot` mutex that is never held
//!   across an await.
//! - All writes go through one async mutex holding the writer half, tagged
//!   with the session generation. A timer or reader from an old session
//!   finds a different generation and does nothing.
//! - Cleanup runs at most once per session, whichever path notices first.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

use crate::activity::Activity;
use crate::config::ClientConfig;
use crate::error::{PresenceError, Result};
use crate::events::{ClientEvent, DisconnectReason};
use crate::messages::{is_invalid_client_id, Command, Handshake, Response};
use crate::throttle::{ThrottleDecision, UpdateThrottle};
use crate::transport::{
    platform_connector, Connector, EndpointAddress, FrameReader, FrameWriter, Opcode, Transport,
    TransportError,
};

/// Connection lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport open
    Disconnected,
    /// Transport open, handshake not yet acknowledged
    Connected,
    /// Handshake acknowledged; activity updates are accepted
    HandshakeComplete,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
            Self::HandshakeComplete => write!(f, "ready"),
        }
    }
}

type HandshakeReply = oneshot::Sender<Result<()>>;

/// How a session is being torn down
enum Teardown {
    /// Local `shutdown()`: say goodbye, stop the reader
    Shutdown,
    /// A foreground or timer write found the pipe gone: stop the reader
    WriteFailed(String),
    /// The reader itself saw the end of the stream
    PeerClosed(String),
}

struct Session {
    state: ConnectionState,
    generation: u64,
    address: Option<EndpointAddress>,
    /// `None` until something is sent this session; `Some(None)` after a clear
    last_activity: Option<Option<Activity>>,
    /// Last value a write actually delivered this session
    confirmed: Option<Option<Activity>>,
    throttle: UpdateThrottle,
    pending: Option<JoinHandle<()>>,
    /// Bumped whenever `pending` is replaced or superseded
    timer_seq: u64,
    reader: Option<JoinHandle<()>>,
    handshake: Option<HandshakeReply>,
}

/// Bookkeeping of one activity write, undone if the write fails
struct SendAttempt {
    generation: u64,
    sent_at: Instant,
    previous_sent: Option<Instant>,
}

struct Inner {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    session: Mutex<Session>,
    writer: tokio::sync::Mutex<Option<(u64, FrameWriter)>>,
    events: broadcast::Sender<ClientEvent>,
}

/// Client for the local rich presence endpoint
///
/// Cloning is cheap; every clone drives the same connection.
#[derive(Clone)]
pub struct RichClient {
    inner: Arc<Inner>,
}

impl RichClient {
    /// Create a client using this platform's connector
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, platform_connector())
    }

    /// Create a client over an explicit connector
    #[must_use]
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let throttle = UpdateThrottle::new(config.update_interval);

        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                session: Mutex::new(Session {
                    state: ConnectionState::Disconnected,
                    generation: 0,
                    address: None,
                    last_activity: None,
                    confirmed: None,
                    throttle,
                    pending: None,
                    timer_seq: 0,
                    reader: None,
                    handshake: None,
                }),
                writer: tokio::sync::Mutex::new(None),
                events,
            }),
        }
    }

    /// Settings this client was built with
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.session.lock().state
    }

    /// Endpoint of the current session, if connected
    #[must_use]
    pub fn address(&self) -> Option<EndpointAddress> {
        let session = self.inner.session.lock();
        match session.state {
            ConnectionState::Disconnected => None,
            _ => session.address.clone(),
        }
    }

    /// Last activity accepted for sending this session
    ///
    /// `None` both before the first update and after a clear.
    #[must_use]
    pub fn last_activity(&self) -> Option<Activity> {
        self.inner.session.lock().last_activity.clone().flatten()
    }

    /// Register for lifecycle events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Open the endpoint and perform the handshake
    ///
    /// Does nothing if a session already exists. With `wait_for_ready`
    /// set, returns once the endpoint acknowledges the handshake.
    ///
    /// # Errors
    ///
    /// - `Transport(EndpointNotFound)` if no endpoint exists
    /// - `Transport(ConnectionFailed)` if an endpoint refused the connection
    /// - `InvalidClientId` if the endpoint rejected the application id; the
    ///   state stays `Connected` until `shutdown()`
    pub async fn connect(&self) -> Result<()> {
        if self.state() != ConnectionState::Disconnected {
            return Ok(());
        }

        let inner = &self.inner;
        let locator = inner.config.locator();
        let transport = Transport::open(&locator, inner.connector.as_ref())
            .await?
            .with_max_frame_size(inner.config.max_frame_size);
        let address = transport.address().clone();
        let (reader, writer) = transport.into_split()?;

        let mut writer_slot = inner.writer.lock().await;
        let (reply_tx, reply_rx) = oneshot::channel();
        let generation = {
            let mut session = inner.session.lock();
            if session.state != ConnectionState::Disconnected {
                tracing::debug!("Concurrent connect won, dropping this transport");
                return Ok(());
            }
            session.generation += 1;
            session.state = ConnectionState::Connected;
            session.address = Some(address.clone());
            session.last_activity = None;
            session.confirmed = None;
            session.throttle.reset();
            session.handshake = Some(reply_tx);
            session.generation
        };
        *writer_slot = Some((generation, writer));

        let handle = tokio::spawn(receive_loop(Arc::clone(inner), generation, reader));
        {
            let mut session = inner.session.lock();
            if session.generation == generation && session.state != ConnectionState::Disconnected {
                session.reader = Some(handle);
            }
        }

        let handshake = Handshake::new(inner.config.client_id.clone());
        let sent = match writer_slot.as_mut() {
            Some((_, writer)) => writer.write_json(Opcode::Handshake, &handshake).await,
            None => Err(session_ended()),
        };
        drop(writer_slot);

        if let Err(e) = sent {
            inner
                .teardown(generation, Teardown::WriteFailed(e.to_string()))
                .await;
            return Err(e.into());
        }

        tracing::info!(
            %address,
            client_id = %inner.config.client_id,
            "Connected to presence endpoint"
        );

        if !inner.config.wait_for_ready {
            return Ok(());
        }

        match reply_rx.await {
            Ok(reply) => reply,
            Err(_) => Err(TransportError::ConnectionClosed(
                "closed before handshake was acknowledged".to_string(),
            )
            .into()),
        }
    }

    /// Set the activity, or clear it with `None`
    ///
    /// An activity equal to the last one sent is skipped. Inside the
    /// throttle window the value is cached and sent when the window
    /// reopens; later calls replace it. A failed write leaves the cache and
    /// the window as they were before the call.
    ///
    /// # Errors
    ///
    /// - `NotConnected` before the handshake completes
    /// - `InvalidActivity` if a field breaks a protocol limit
    /// - `Transport` if an immediate write fails
    pub async fn update(&self, activity: Option<Activity>) -> Result<()> {
        let inner = &self.inner;
        let now = Instant::now();

        let attempt = {
            let mut session = inner.session.lock();
            if session.state != ConnectionState::HandshakeComplete {
                return Err(PresenceError::NotConnected);
            }
            if let Some(activity) = &activity {
                activity.validate()?;
            }
            if session.last_activity.as_ref() == Some(&activity) {
                tracing::debug!("Activity unchanged, skipping update");
                return Ok(());
            }
            session.last_activity = Some(activity.clone());

            match session.throttle.check(now) {
                ThrottleDecision::SendNow => {
                    let previous_sent = session.throttle.last_sent();
                    session.throttle.record_send(now);
                    session.timer_seq += 1;
                    if let Some(pending) = session.pending.take() {
                        pending.abort();
                    }
                    SendAttempt {
                        generation: session.generation,
                        sent_at: now,
                        previous_sent,
                    }
                }
                ThrottleDecision::Defer { remaining } => {
                    session.timer_seq += 1;
                    if let Some(pending) = session.pending.take() {
                        pending.abort();
                    }
                    session.pending = Some(tokio::spawn(deferred_send(
                        Arc::clone(inner),
                        session.generation,
                        session.timer_seq,
                        remaining,
                    )));
                    tracing::debug!(?remaining, "Update deferred");
                    return Ok(());
                }
            }
        };

        inner.send_activity(attempt, activity).await
    }

    /// Clear the activity
    ///
    /// # Errors
    ///
    /// Same as [`RichClient::update`].
    pub async fn clear(&self) -> Result<()> {
        self.update(None).await
    }

    /// Tear down the session and connect again
    ///
    /// # Errors
    ///
    /// `NotConnected` unless the handshake has completed, otherwise as
    /// [`RichClient::connect`].
    pub async fn reconnect(&self) -> Result<()> {
        if self.state() != ConnectionState::HandshakeComplete {
            return Err(PresenceError::NotConnected);
        }
        tracing::info!("Reconnecting");
        self.shutdown().await;
        self.connect().await
    }

    /// Close the session gracefully; does nothing when disconnected
    pub async fn shutdown(&self) {
        let generation = {
            let session = self.inner.session.lock();
            if session.state == ConnectionState::Disconnected {
                return;
            }
            session.generation
        };
        self.inner.teardown(generation, Teardown::Shutdown).await;
    }
}

impl Inner {
    async fn send_activity(&self, attempt: SendAttempt, activity: Option<Activity>) -> Result<()> {
        let command = Command::set_activity(activity.clone());
        let result = self
            .write_json_checked(attempt.generation, Opcode::Frame, &command)
            .await;

        match &result {
            Ok(()) => {
                let mut session = self.session.lock();
                if session.generation == attempt.generation {
                    session.confirmed = Some(activity);
                }
            }
            Err(e) if e.is_connection_closed() => {
                self.teardown(attempt.generation, Teardown::WriteFailed(e.to_string()))
                    .await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Activity write failed, keeping previous value");
                self.rollback_send(&attempt, &activity);
            }
        }
        result.map_err(Into::into)
    }

    /// Undo the cache and throttle changes of a write that never went out
    fn rollback_send(&self, attempt: &SendAttempt, attempted: &Option<Activity>) {
        let mut session = self.session.lock();
        if session.generation != attempt.generation
            || session.state != ConnectionState::HandshakeComplete
        {
            return;
        }
        // A newer value waiting for the timer stays cached
        if session.last_activity.as_ref() == Some(attempted) {
            session.last_activity = session.confirmed.clone();
        }
        if session.throttle.last_sent() == Some(attempt.sent_at) {
            session.throttle.restore(attempt.previous_sent);
        }
    }

    async fn write_json_checked(
        &self,
        generation: u64,
        opcode: Opcode,
        msg: &Command,
    ) -> std::result::Result<(), TransportError> {
        let mut slot = self.writer.lock().await;
        match slot.as_mut() {
            Some((current, writer)) if *current == generation => {
                writer.write_json(opcode, msg).await
            }
            _ => Err(session_ended()),
        }
    }

    async fn write_checked(
        &self,
        generation: u64,
        opcode: Opcode,
        payload: &[u8],
    ) -> std::result::Result<(), TransportError> {
        let mut slot = self.writer.lock().await;
        match slot.as_mut() {
            Some((current, writer)) if *current == generation => {
                writer.write(opcode, Some(payload)).await
            }
            _ => Err(session_ended()),
        }
    }

    /// End session `generation`; returns false if it already ended
    async fn teardown(&self, generation: u64, how: Teardown) -> bool {
        let (pending, reader) = {
            let mut session = self.session.lock();
            if session.generation != generation || session.state == ConnectionState::Disconnected
            {
                return false;
            }
            session.state = ConnectionState::Disconnected;
            session.last_activity = None;
            session.confirmed = None;
            session.throttle.reset();
            session.timer_seq += 1;
            session.handshake = None;
            (session.pending.take(), session.reader.take())
        };

        if let Some(pending) = pending {
            pending.abort();
        }

        let writer = {
            let mut slot = self.writer.lock().await;
            match slot.take() {
                Some((current, writer)) if current == generation => Some(writer),
                other => {
                    *slot = other;
                    None
                }
            }
        };

        if let Some(mut writer) = writer {
            if matches!(how, Teardown::Shutdown) {
                if let Err(e) = writer.write(Opcode::Close, None).await {
                    tracing::debug!(error = %e, "Close frame not delivered");
                }
            }
            writer.close().await;
        }

        let reason = match how {
            Teardown::Shutdown => {
                if let Some(reader) = reader {
                    reader.abort();
                    // Cancellation is the expected outcome
                    let _ = reader.await;
                }
                tracing::info!(generation, "Presence session shut down");
                DisconnectReason::Shutdown
            }
            Teardown::WriteFailed(detail) => {
                if let Some(reader) = reader {
                    reader.abort();
                }
                tracing::warn!(generation, %detail, "Write failed, session closed");
                DisconnectReason::ClosedByPeer(detail)
            }
            Teardown::PeerClosed(detail) => {
                tracing::info!(generation, %detail, "Presence endpoint closed the session");
                DisconnectReason::ClosedByPeer(detail)
            }
        };

        // No subscribers is fine
        let _ = self.events.send(ClientEvent::Disconnected { reason });
        true
    }

    /// Handle an opcode 1 frame; returns false when the loop should stop
    fn handle_frame(&self, generation: u64, payload: &[u8]) -> bool {
        let mut session = self.session.lock();
        if session.generation != generation {
            return false;
        }

        let state = session.state;
        match state {
            ConnectionState::Disconnected => false,
            ConnectionState::Connected => {
                if is_invalid_client_id(payload) {
                    let reply = session.handshake.take();
                    drop(session);
                    self.reject_handshake(reply, payload);
                    return false;
                }

                session.state = ConnectionState::HandshakeComplete;
                if let Some(reply) = session.handshake.take() {
                    // The caller may have stopped waiting
                    let _ = reply.send(Ok(()));
                }
                drop(session);

                tracing::info!(generation, "Handshake acknowledged");
                let _ = self.events.send(ClientEvent::Ready);
                true
            }
            ConnectionState::HandshakeComplete => {
                drop(session);
                match Response::parse(payload) {
                    Some(response) if response.is_error() => {
                        tracing::warn!(
                            code = ?response.error_code(),
                            message = response.error_message().unwrap_or_default(),
                            "Endpoint rejected command"
                        );
                    }
                    Some(response) => {
                        tracing::trace!(nonce = ?response.nonce, "Command acknowledged");
                        let _ = self.events.send(ClientEvent::ActivityUpdated(response));
                    }
                    None => {
                        tracing::debug!("Ignoring unparseable response");
                    }
                }
                true
            }
        }
    }

    fn reject_handshake(&self, reply: Option<HandshakeReply>, payload: &[u8]) {
        let message = Response::parse(payload)
            .and_then(|r| r.error_message().map(str::to_owned))
            .unwrap_or_else(|| String::from_utf8_lossy(payload).into_owned());

        tracing::error!(
            client_id = %self.config.client_id,
            %message,
            "Endpoint rejected the client id"
        );
        if let Some(reply) = reply {
            let _ = reply.send(Err(PresenceError::InvalidClientId(message)));
        }
    }

    fn state_of(&self, generation: u64) -> Option<ConnectionState> {
        let session = self.session.lock();
        (session.generation == generation).then_some(session.state)
    }
}

fn session_ended() -> TransportError {
    TransportError::ConnectionClosed("session ended".to_string())
}

async fn receive_loop(inner: Arc<Inner>, generation: u64, mut reader: FrameReader) {
    loop {
        let frame = match reader.read().await {
            Ok(frame) => frame,
            Err(e) => {
                inner
                    .teardown(generation, Teardown::PeerClosed(e.to_string()))
                    .await;
                return;
            }
        };

        match frame.opcode {
            Opcode::Frame => {
                if !inner.handle_frame(generation, &frame.payload) {
                    return;
                }
            }
            Opcode::Close => {
                if inner.state_of(generation) == Some(ConnectionState::Connected)
                    && is_invalid_client_id(&frame.payload)
                {
                    let reply = inner.session.lock().handshake.take();
                    inner.reject_handshake(reply, &frame.payload);
                    return;
                }

                let detail = Response::parse(&frame.payload)
                    .and_then(|r| r.error_message().map(str::to_owned))
                    .unwrap_or_else(|| frame.payload_text());
                inner
                    .teardown(generation, Teardown::PeerClosed(detail))
                    .await;
                return;
            }
            Opcode::Ping => {
                if let Err(e) = inner
                    .write_checked(generation, Opcode::Pong, &frame.payload)
                    .await
                {
                    tracing::debug!(error = %e, "Pong not delivered");
                }
            }
            other => {
                tracing::trace!(opcode = %other, "Ignoring frame");
            }
        }
    }
}

async fn deferred_send(inner: Arc<Inner>, generation: u64, seq: u64, delay: Duration) {
    tokio::time::sleep(delay).await;

    let (attempt, activity) = {
        let mut session = inner.session.lock();
        if session.generation != generation
            || session.timer_seq != seq
            || session.state != ConnectionState::HandshakeComplete
        {
            return;
        }
        // Detach our own handle so teardown never aborts this task
        session.pending = None;
        let Some(activity) = session.last_activity.clone() else {
            return;
        };
        let now = Instant::now();
        let attempt = SendAttempt {
            generation,
            sent_at: now,
            previous_sent: session.throttle.last_sent(),
        };
        session.throttle.record_send(now);
        (attempt, activity)
    };

    tracing::debug!("Sending deferred update");
    if let Err(e) = inner.send_activity(attempt, activity).await {
        tracing::warn!(error = %e, "Deferred update failed");
    }
}
