// ABOUTME: WebSocket transport binding for bridge sessions
// Opens one socket per session and feeds its lifecycle into the Session state machine

use crate::error::BridgeError;
use crate::identity::SessionIdentity;
use crate::terminal::adapter::{TerminalEvent, TerminalSink};
use crate::terminal::protocol::InboundFrame;
use crate::terminal::session::{ConnectionUrl, Endpoint, Session, SessionOutcome, TransportEvent};
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, error::ProtocolError, Message};
use tracing::{debug, error, info, info_span, trace, Instrument};
use url::Url;

/// Connects sessions to the server at one endpoint
#[derive(Debug, Clone)]
pub struct WebSocketBridge {
    endpoint: Endpoint,
}

impl WebSocketBridge {
    pub const fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Build the connection URL and check this build can carry it, without
    /// touching the network
    pub fn preflight(&self, identity: &SessionIdentity) -> Result<ConnectionUrl, BridgeError> {
        let url = ConnectionUrl::build(&self.endpoint, identity)?;
        check_capability(url.as_str())?;
        Ok(url)
    }

    /// Run one session to completion.
    ///
    /// Terminal events are relayed only while the session is open. When the
    /// event stream ends the session is discarded and the socket closed, or
    /// the handshake abandoned if it is still in flight.
    pub async fn run<T, E>(
        &self,
        identity: SessionIdentity,
        terminal: T,
        events: E,
    ) -> Result<SessionOutcome, BridgeError>
    where
        T: TerminalSink,
        E: Stream<Item = TerminalEvent> + Unpin,
    {
        let url = self.preflight(&identity)?;
        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<String>();
        let mut session = Session::new(identity, url, frame_tx, terminal);

        let span = info_span!("session", id = %session.id());
        Self::drive(&mut session, frame_rx, events)
            .instrument(span)
            .await
    }

    async fn drive<T, E>(
        session: &mut Session<mpsc::UnboundedSender<String>, T>,
        mut frame_rx: mpsc::UnboundedReceiver<String>,
        mut events: E,
    ) -> Result<SessionOutcome, BridgeError>
    where
        T: TerminalSink,
        E: Stream<Item = TerminalEvent> + Unpin,
    {
        session.connect();
        let url = session.url().to_string();

        // Only the latest size matters once the session opens
        let mut pending_resize = None;
        let connecting = connect_async(url.as_str());
        tokio::pin!(connecting);

        let ws_stream = loop {
            tokio::select! {
                result = &mut connecting => match result {
                    Ok((ws_stream, response)) => {
                        info!("WebSocket connected to {}", url);
                        debug!("WebSocket response status: {:?}", response.status());
                        break ws_stream;
                    }
                    Err(e) => {
                        error!("WebSocket handshake failed: {}", e);
                        session.handle_transport(TransportEvent::Error(e.to_string()));
                        return Ok(session.outcome());
                    }
                },

                event = events.next() => match event {
                    Some(resize @ TerminalEvent::Resize { .. }) => pending_resize = Some(resize),
                    Some(event) => trace!("Discarding input while connecting: {:?}", event),
                    None => {
                        info!("Terminal detached while connecting, abandoning handshake");
                        return Ok(SessionOutcome::Detached);
                    }
                },
            }
        };

        session.handle_transport(TransportEvent::Opened);
        if let Some(resize) = pending_resize {
            session.handle_terminal(resize);
        }
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let outcome = loop {
            tokio::select! {
                biased;

                // Outbound frames first, so everything queued before a close goes out
                Some(frame) = frame_rx.recv() => {
                    trace!("Sending frame: {}", frame);
                    if let Err(e) = ws_sender.send(Message::Text(frame)).await {
                        session.handle_transport(TransportEvent::Error(e.to_string()));
                    }
                }

                incoming = ws_receiver.next() => {
                    if let Some(event) = transport_event(incoming) {
                        session.handle_transport(event);
                    }
                }

                event = events.next(), if session.state().accepts_input() => match event {
                    Some(event) => session.handle_terminal(event),
                    None => {
                        info!("Terminal detached, discarding session");
                        break SessionOutcome::Detached;
                    }
                },
            }

            if session.state().is_terminal() {
                break session.outcome();
            }
        };

        // Completes the closing handshake, or starts it when detaching
        if let Err(e) = ws_sender.close().await {
            debug!("Socket close: {}", e);
        }
        Ok(outcome)
    }
}

/// Map one read from the socket to a transport event. Control frames map to nothing.
fn transport_event(
    incoming: Option<Result<Message, tungstenite::Error>>,
) -> Option<TransportEvent> {
    match incoming {
        Some(Ok(Message::Text(text))) => Some(TransportEvent::Frame(InboundFrame::Text(text))),
        Some(Ok(Message::Binary(bytes))) => {
            Some(TransportEvent::Frame(InboundFrame::Binary(bytes)))
        }
        Some(Ok(Message::Close(frame))) => {
            info!("WebSocket closed by server: {:?}", frame);
            Some(TransportEvent::Closed {
                clean: true,
                reason: frame.map(|f| f.reason.into_owned()).unwrap_or_default(),
            })
        }
        Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => None,
        Some(Err(tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake))) => {
            Some(TransportEvent::Closed {
                clean: false,
                reason: "connection reset without closing handshake".to_string(),
            })
        }
        Some(Err(e)) => Some(TransportEvent::Error(e.to_string())),
        None => Some(TransportEvent::Closed {
            clean: false,
            reason: "connection dropped".to_string(),
        }),
    }
}

/// Reject URLs this build cannot connect to, before any session exists
fn check_capability(url: &str) -> Result<(), BridgeError> {
    let parsed = Url::parse(url).map_err(|e| BridgeError::InvalidEndpoint(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "ws" => Ok(()),
        "wss" if cfg!(feature = "tls") => Ok(()),
        "wss" => Err(BridgeError::TransportUnsupported(
            "wss endpoints need the `tls` feature".to_string(),
        )),
        scheme => Err(BridgeError::TransportUnsupported(format!(
            "'{scheme}' is not a WebSocket scheme"
        ))),
    }
}
