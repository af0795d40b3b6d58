// ABOUTME: Terminal session bridge between the local terminal and a container over WebSocket
// Codec, adapter, state machine and connection lifecycle for log and shell sessions

pub mod adapter;
pub mod keys;
pub mod protocol;
pub mod session;
pub mod state;
pub mod terminal_emulator;
pub mod websocket_client;

pub use adapter::{TerminalAdapter, TerminalEvent, TerminalSink};
pub use protocol::{InboundFrame, ModeCodec, ProtocolViolation, TerminalWrite, WireMessage};
pub use session::{ConnectionUrl, Endpoint, FrameSink, Session, SessionOutcome, TransportEvent};
pub use state::{SessionEvent, SessionState, SessionStateMachine};
pub use terminal_emulator::LocalTerminal;
pub use websocket_client::WebSocketBridge;
