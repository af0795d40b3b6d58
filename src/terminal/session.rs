// ABOUTME: Connection lifecycle for one bridge session
// Builds the connection URL, owns the transport and terminal, and drives the state machine

use crate::error::BridgeError;
use crate::identity::{SessionIdentity, SessionMode};
use crate::terminal::adapter::{TerminalAdapter, TerminalEvent, TerminalSink};
use crate::terminal::protocol::{InboundFrame, WireMessage};
use crate::terminal::state::{SessionEvent, SessionState, SessionStateMachine};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};
use url::Url;
use uuid::Uuid;

const PEER_CLOSED_NOTICE: &str = "Connection closed by peer. Start a new session to reconnect.";
const RESTART_NOTICE: &str = "Session terminated. Start a new session to reconnect.";

// ============================================
// Connection URL
// ============================================

/// Server the sessions connect to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `host[:port]`
    pub host: String,
    /// `wss` when true, `ws` otherwise
    pub secure: bool,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, secure: bool) -> Self {
        Self {
            host: host.into(),
            secure,
        }
    }

    pub const fn scheme(&self) -> &'static str {
        if self.secure {
            "wss"
        } else {
            "ws"
        }
    }
}

/// Connection URL derived from an identity. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUrl(String);

impl ConnectionUrl {
    /// `ws(s)://<host>/ws/<namespace>/<pod>/<container>/<logs|webshell>[?tail=..&follow=..]`
    ///
    /// Log query parameters appear only when the identity carries them.
    pub fn build(endpoint: &Endpoint, identity: &SessionIdentity) -> Result<Self, BridgeError> {
        let host = endpoint.host.trim();
        if host.is_empty() || host.contains(['/', '?', '#', ' ']) {
            return Err(BridgeError::InvalidEndpoint(format!("bad host {host:?}")));
        }

        let mut url = format!(
            "{}://{}/ws/{}/{}/{}/{}",
            endpoint.scheme(),
            host,
            identity.namespace,
            identity.pod,
            identity.container,
            identity.mode.path()
        );

        if identity.mode == SessionMode::Logs {
            let options = identity.log_options;
            let query: Vec<String> = [
                options.tail_lines.map(|tail| format!("tail={tail}")),
                options.follow.map(|follow| format!("follow={follow}")),
            ]
            .into_iter()
            .flatten()
            .collect();

            if !query.is_empty() {
                url.push('?');
                url.push_str(&query.join("&"));
            }
        }

        Url::parse(&url).map_err(|e| BridgeError::InvalidEndpoint(format!("{url}: {e}")))?;
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_secure(&self) -> bool {
        self.0.starts_with("wss://")
    }
}

impl fmt::Display for ConnectionUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================
// Transport seam
// ============================================

/// Outbound half of the transport owned by a session
pub trait FrameSink {
    fn send_frame(&mut self, frame: String) -> Result<(), BridgeError>;

    /// Called once when the session is discarded
    fn release(&mut self) {}
}

impl FrameSink for mpsc::UnboundedSender<String> {
    fn send_frame(&mut self, frame: String) -> Result<(), BridgeError> {
        self.send(frame)
            .map_err(|_| BridgeError::Transport("socket writer is gone".to_string()))
    }
}

/// Lifecycle events reported by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Frame(InboundFrame),
    /// `clean` is true when the closing handshake completed
    Closed { clean: bool, reason: String },
    Error(String),
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Peer closed the connection gracefully
    Closed,
    /// Transport failed; the terminal was torn down
    Failed(String),
    /// The session was discarded locally before the peer closed it
    Detached,
}

// ============================================
// Session
// ============================================

/// One bridge between a terminal and a remote log stream or shell.
///
/// Owns exactly one transport and one terminal for its lifetime. Dropping the
/// session releases the transport and stops all relaying.
pub struct Session<S: FrameSink, T: TerminalSink> {
    id: Uuid,
    identity: SessionIdentity,
    url: ConnectionUrl,
    machine: SessionStateMachine,
    transport: S,
    adapter: TerminalAdapter<T>,
    failure: Option<String>,
}

impl<S: FrameSink, T: TerminalSink> Session<S, T> {
    /// Create an idle session
    pub fn new(identity: SessionIdentity, url: ConnectionUrl, transport: S, terminal: T) -> Self {
        let adapter = TerminalAdapter::new(terminal, identity.mode);
        Self {
            id: Uuid::new_v4(),
            identity,
            url,
            machine: SessionStateMachine::new(),
            transport,
            adapter,
            failure: None,
        }
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub const fn url(&self) -> &ConnectionUrl {
        &self.url
    }

    pub const fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub const fn terminal(&self) -> &T {
        self.adapter.terminal()
    }

    /// Idle → Connecting. The caller opens the transport next.
    pub fn connect(&mut self) {
        if let Err(e) = self.machine.apply(SessionEvent::Connect) {
            debug!("Ignoring connect: {}", e);
            return;
        }
        info!(session = %self.id, "Connecting to {}", self.url);
        if self.identity.mode == SessionMode::Shell {
            self.adapter
                .write(&format!("connecting to pod {}...", self.identity.pod));
        }
    }

    pub fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.on_open(),
            TransportEvent::Frame(frame) => self.on_frame(&frame),
            TransportEvent::Closed { clean: true, reason } => self.on_clean_close(&reason),
            TransportEvent::Closed { clean: false, reason } => {
                let reason = if reason.is_empty() {
                    "connection lost".to_string()
                } else {
                    reason
                };
                self.fail(&reason);
            }
            TransportEvent::Error(reason) => self.fail(&reason),
        }
    }

    pub fn handle_terminal(&mut self, event: TerminalEvent) {
        if !self.state().accepts_input() || !self.adapter.is_subscribed() {
            trace!("Discarding terminal event in {:?}: {:?}", self.state(), event);
            return;
        }
        match self.adapter.outbound(&event) {
            Ok(Some(frame)) => self.send(frame),
            Ok(None) => {}
            Err(e) => warn!("Dropping terminal event {:?}: {}", event, e),
        }
    }

    pub fn outcome(&self) -> SessionOutcome {
        match (self.state(), &self.failure) {
            (SessionState::Closed, Some(reason)) => SessionOutcome::Failed(reason.clone()),
            (SessionState::Closed, None) => SessionOutcome::Closed,
            _ => SessionOutcome::Detached,
        }
    }

    fn on_open(&mut self) {
        if let Err(e) = self.machine.apply(SessionEvent::TransportOpened) {
            debug!("Ignoring open: {}", e);
            return;
        }
        info!(session = %self.id, "Session open");

        if self.identity.mode == SessionMode::Shell {
            self.adapter.write("\r");
            match WireMessage::priming().encode() {
                Ok(frame) => self.send(frame),
                Err(e) => self.fail(&e.to_string()),
            }
        }
    }

    fn on_frame(&mut self, frame: &InboundFrame) {
        if !self.state().accepts_input() {
            trace!("Discarding inbound frame in {:?}", self.state());
            return;
        }
        if let Err(violation) = self.adapter.inbound(frame) {
            warn!(session = %self.id, "Protocol violation, frame discarded: {}", violation);
        }
    }

    fn on_clean_close(&mut self, reason: &str) {
        match self.state() {
            SessionState::Open => {}
            SessionState::Connecting => {
                self.fail("connection closed before it opened");
                return;
            }
            state => {
                debug!("Ignoring close in {:?}", state);
                return;
            }
        }

        if self.machine.apply(SessionEvent::CleanClose).is_err() {
            return;
        }
        info!(session = %self.id, "Connection closed cleanly: {:?}", reason);

        self.adapter.writeln("");
        if self.identity.mode == SessionMode::Shell {
            self.adapter.writeln(PEER_CLOSED_NOTICE);
        }
        self.adapter.unsubscribe();
    }

    fn fail(&mut self, reason: &str) {
        if let Err(e) = self.machine.apply(SessionEvent::TransportFailed) {
            debug!("Ignoring transport failure ({}): {}", reason, e);
            return;
        }
        error!(session = %self.id, "Transport error: {}", reason);
        self.failure = Some(reason.to_string());

        self.adapter.writeln("");
        self.adapter.writeln(&format!("error: {reason}"));
        self.adapter.writeln(RESTART_NOTICE);
        self.adapter.destroy();
        self.adapter.unsubscribe();

        if let Err(e) = self.machine.apply(SessionEvent::TornDown) {
            debug!("Teardown transition rejected: {}", e);
        }
    }

    fn send(&mut self, frame: String) {
        trace!("Queueing frame: {}", frame);
        if let Err(e) = self.transport.send_frame(frame) {
            self.fail(&e.to_string());
        }
    }
}

impl<S: FrameSink, T: TerminalSink> Drop for Session<S, T> {
    fn drop(&mut self) {
        self.adapter.unsubscribe();
        self.transport.release();
        debug!(session = %self.id, "Session released in {:?}", self.state());
    }
}
