// ABOUTME: Wire protocol for shell and log sessions between the terminal and a container
// Shell frames are JSON operation envelopes, log frames are raw text lines

use crate::error::BridgeError;
use crate::identity::SessionMode;
use crate::terminal::adapter::TerminalEvent;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Command sent once on shell open to set the remote terminal type
pub const PRIMING_COMMAND: &str = "export TERM=xterm && clear \r";

// ============================================
// Shell Wire Messages
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum WireMessage {
    // Terminal → container
    Stdin { data: String },
    Resize { cols: u16, rows: u16 },

    // Container → terminal
    Stdout { data: String },
}

/// Loose receive-side envelope, so unknown operations never fail at the framing layer
#[derive(Debug, Deserialize)]
struct Envelope {
    operation: String,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    cols: Option<u16>,
    #[serde(default)]
    rows: Option<u16>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("unexpected operation '{0}'")]
    UnexpectedOperation(String),

    #[error("operation '{0}' carries no data")]
    MissingData(&'static str),

    #[error("invalid terminal size {cols}x{rows}")]
    InvalidSize { cols: u16, rows: u16 },

    #[error("binary frame in shell session")]
    BinaryFrame,
}

impl WireMessage {
    /// Create a stdin message
    pub fn stdin(data: impl Into<String>) -> Self {
        Self::Stdin { data: data.into() }
    }

    /// Create a resize message; both dimensions must be non-zero
    pub fn resize(cols: u16, rows: u16) -> Result<Self, ProtocolViolation> {
        if cols == 0 || rows == 0 {
            return Err(ProtocolViolation::InvalidSize { cols, rows });
        }
        Ok(Self::Resize { cols, rows })
    }

    /// The priming message sent when a shell session opens
    pub fn priming() -> Self {
        Self::stdin(PRIMING_COMMAND)
    }

    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Stdin { .. } => "stdin",
            Self::Resize { .. } => "resize",
            Self::Stdout { .. } => "stdout",
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode one shell frame. Extra fields are tolerated; a missing or
    /// unknown operation is a violation, never a framing error.
    pub fn decode(frame: &str) -> Result<Self, ProtocolViolation> {
        let envelope: Envelope = serde_json::from_str(frame)
            .map_err(|e| ProtocolViolation::Malformed(e.to_string()))?;

        match envelope.operation.as_str() {
            "stdin" => Ok(Self::Stdin {
                data: envelope.data.ok_or(ProtocolViolation::MissingData("stdin"))?,
            }),
            "stdout" => Ok(Self::Stdout {
                data: envelope.data.ok_or(ProtocolViolation::MissingData("stdout"))?,
            }),
            "resize" => Self::resize(
                envelope.cols.unwrap_or_default(),
                envelope.rows.unwrap_or_default(),
            ),
            other => Err(ProtocolViolation::UnknownOperation(other.to_string())),
        }
    }
}

// ============================================
// Mode Codec
// ============================================

/// One frame as received from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
}

/// What a decoded inbound frame asks of the terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalWrite {
    /// Written as-is (shell stdout, may hold partial lines and escapes)
    Raw(String),
    /// Written verbatim followed by a line break (one log line)
    Line(String),
}

/// Encodes terminal events and decodes inbound frames for one session mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeCodec {
    Logs,
    Shell,
}

impl ModeCodec {
    pub const fn for_mode(mode: SessionMode) -> Self {
        match mode {
            SessionMode::Logs => Self::Logs,
            SessionMode::Shell => Self::Shell,
        }
    }

    /// Wrap a terminal event in its wire envelope. Log sessions are
    /// receive-only, so nothing is relayed for them.
    pub fn envelope(self, event: &TerminalEvent) -> Result<Option<WireMessage>, ProtocolViolation> {
        match self {
            Self::Logs => Ok(None),
            Self::Shell => match event {
                TerminalEvent::Input(data) => Ok(Some(WireMessage::stdin(data.as_str()))),
                TerminalEvent::Resize { cols, rows } => WireMessage::resize(*cols, *rows).map(Some),
            },
        }
    }

    /// Encode a terminal event into an outbound frame, if this mode relays it
    pub fn encode(self, event: &TerminalEvent) -> Result<Option<String>, BridgeError> {
        match self.envelope(event)? {
            Some(message) => Ok(Some(message.encode()?)),
            None => Ok(None),
        }
    }

    pub fn decode(self, frame: &InboundFrame) -> Result<TerminalWrite, ProtocolViolation> {
        match (self, frame) {
            (Self::Logs, InboundFrame::Text(text)) => Ok(TerminalWrite::Line(text.clone())),
            (Self::Logs, InboundFrame::Binary(bytes)) => {
                Ok(TerminalWrite::Line(String::from_utf8_lossy(bytes).into_owned()))
            }
            (Self::Shell, InboundFrame::Binary(_)) => Err(ProtocolViolation::BinaryFrame),
            (Self::Shell, InboundFrame::Text(text)) => match WireMessage::decode(text)? {
                WireMessage::Stdout { data } => Ok(TerminalWrite::Raw(data)),
                other => Err(ProtocolViolation::UnexpectedOperation(
                    other.operation().to_string(),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_priming_frame_is_exact() {
        let frame = WireMessage::priming().encode().unwrap();
        assert_eq!(
            frame,
            r#"{"operation":"stdin","data":"export TERM=xterm && clear \r"}"#
        );
    }

    #[test]
    fn test_resize_frame_shape() {
        let frame = WireMessage::resize(120, 40).unwrap().encode().unwrap();
        assert_eq!(frame, r#"{"operation":"resize","cols":120,"rows":40}"#);
    }

    #[test]
    fn test_resize_rejects_zero_dimensions() {
        assert_eq!(
            WireMessage::resize(0, 40),
            Err(ProtocolViolation::InvalidSize { cols: 0, rows: 40 })
        );
    }

    #[test]
    fn test_decode_round_trips() {
        let messages = [
            WireMessage::stdin("ls -la\r"),
            WireMessage::Stdout {
                data: "\u{1b}[32mok\u{1b}[0m\r\n".to_string(),
            },
            WireMessage::resize(80, 24).unwrap(),
        ];
        for message in messages {
            let decoded = WireMessage::decode(&message.encode().unwrap()).unwrap();
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn test_decode_tolerates_server_padding() {
        // The server serializes every field, zeroed when unused
        let frame = r#"{"operation":"stdout","data":"hi","rows":0,"cols":0}"#;
        assert_eq!(
            WireMessage::decode(frame),
            Ok(WireMessage::Stdout {
                data: "hi".to_string()
            })
        );
    }

    #[test]
    fn test_shell_decode_writes_stdout() {
        let write = ModeCodec::Shell
            .decode(&InboundFrame::Text(
                r#"{"operation":"stdout","data":"hello"}"#.to_string(),
            ))
            .unwrap();
        assert_eq!(write, TerminalWrite::Raw("hello".to_string()));
    }

    #[test]
    fn test_shell_decode_discards_other_operations() {
        let ping = ModeCodec::Shell.decode(&InboundFrame::Text(r#"{"operation":"ping"}"#.to_string()));
        assert_eq!(ping, Err(ProtocolViolation::UnknownOperation("ping".to_string())));

        let echo = ModeCodec::Shell.decode(&InboundFrame::Text(
            r#"{"operation":"stdin","data":"x"}"#.to_string(),
        ));
        assert_eq!(echo, Err(ProtocolViolation::UnexpectedOperation("stdin".to_string())));
    }

    #[test]
    fn test_shell_decode_fails_closed() {
        let garbage = ModeCodec::Shell.decode(&InboundFrame::Text("not json".to_string()));
        assert!(matches!(garbage, Err(ProtocolViolation::Malformed(_))));

        let no_data = ModeCodec::Shell.decode(&InboundFrame::Text(r#"{"operation":"stdout"}"#.to_string()));
        assert_eq!(no_data, Err(ProtocolViolation::MissingData("stdout")));

        let binary = ModeCodec::Shell.decode(&InboundFrame::Binary(vec![0xff]));
        assert_eq!(binary, Err(ProtocolViolation::BinaryFrame));
    }

    #[test]
    fn test_logs_decode_is_verbatim_line() {
        let line = ModeCodec::Logs
            .decode(&InboundFrame::Text(r#"{"operation":"stdout"}"#.to_string()))
            .unwrap();
        assert_eq!(line, TerminalWrite::Line(r#"{"operation":"stdout"}"#.to_string()));

        let binary = ModeCodec::Logs
            .decode(&InboundFrame::Binary(b"2024-01-01 started".to_vec()))
            .unwrap();
        assert_eq!(binary, TerminalWrite::Line("2024-01-01 started".to_string()));
    }

    #[test]
    fn test_logs_encode_relays_nothing() {
        let input = ModeCodec::Logs
            .encode(&TerminalEvent::Input("q".to_string()))
            .unwrap();
        assert_eq!(input, None);

        let resize = ModeCodec::Logs
            .encode(&TerminalEvent::Resize { cols: 80, rows: 24 })
            .unwrap();
        assert_eq!(resize, None);
    }

    #[test]
    fn test_shell_encode_wraps_events() {
        let input = ModeCodec::Shell
            .encode(&TerminalEvent::Input("a".to_string()))
            .unwrap();
        assert_eq!(input.as_deref(), Some(r#"{"operation":"stdin","data":"a"}"#));
    }
}
