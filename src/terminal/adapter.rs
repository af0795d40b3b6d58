// ABOUTME: Terminal I/O adapter translating between terminal events and wire frames
// Owns the terminal handle for a session and gates writes once unsubscribed

use crate::error::BridgeError;
use crate::identity::SessionMode;
use crate::terminal::protocol::{InboundFrame, ModeCodec, ProtocolViolation, TerminalWrite};
use std::io;
use tracing::{trace, warn};

/// The terminal-emulator side of a session
pub trait TerminalSink {
    /// Write data as-is
    fn write(&mut self, data: &str) -> io::Result<()>;

    /// Write a line followed by a line break
    fn writeln(&mut self, line: &str) -> io::Result<()>;

    /// Release the terminal's resources. No writes follow.
    fn destroy(&mut self);
}

/// Events produced by the terminal emulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// Keystrokes or pasted text, already encoded as terminal input bytes
    Input(String),
    Resize { cols: u16, rows: u16 },
}

pub struct TerminalAdapter<T: TerminalSink> {
    terminal: T,
    codec: ModeCodec,
    subscribed: bool,
    destroyed: bool,
}

impl<T: TerminalSink> TerminalAdapter<T> {
    pub const fn new(terminal: T, mode: SessionMode) -> Self {
        Self {
            terminal,
            codec: ModeCodec::for_mode(mode),
            subscribed: true,
            destroyed: false,
        }
    }

    pub const fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub const fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub const fn terminal(&self) -> &T {
        &self.terminal
    }

    /// Stop relaying in either direction
    pub fn unsubscribe(&mut self) {
        if self.subscribed {
            trace!("Terminal adapter unsubscribed");
        }
        self.subscribed = false;
    }

    /// Translate a terminal event into an outbound frame, if one is due
    pub fn outbound(&self, event: &TerminalEvent) -> Result<Option<String>, BridgeError> {
        if !self.subscribed {
            return Ok(None);
        }
        self.codec.encode(event)
    }

    /// Apply one inbound frame to the terminal. Violations leave the terminal untouched.
    pub fn inbound(&mut self, frame: &InboundFrame) -> Result<(), ProtocolViolation> {
        if !self.subscribed {
            return Ok(());
        }
        match self.codec.decode(frame)? {
            TerminalWrite::Raw(data) => self.write(&data),
            TerminalWrite::Line(line) => self.writeln(&line),
        }
        Ok(())
    }

    pub fn write(&mut self, data: &str) {
        if self.destroyed {
            return;
        }
        if let Err(e) = self.terminal.write(data) {
            warn!("Terminal write failed: {}", e);
        }
    }

    pub fn writeln(&mut self, line: &str) {
        if self.destroyed {
            return;
        }
        if let Err(e) = self.terminal.writeln(line) {
            warn!("Terminal write failed: {}", e);
        }
    }

    pub fn destroy(&mut self) {
        if !self.destroyed {
            self.terminal.destroy();
            self.destroyed = true;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Captures everything written to it
    #[derive(Debug, Default)]
    pub(crate) struct RecordingTerminal {
        pub output: String,
        pub destroyed: usize,
    }

    impl TerminalSink for RecordingTerminal {
        fn write(&mut self, data: &str) -> io::Result<()> {
            self.output.push_str(data);
            Ok(())
        }

        fn writeln(&mut self, line: &str) -> io::Result<()> {
            self.output.push_str(line);
            self.output.push_str("\r\n");
            Ok(())
        }

        fn destroy(&mut self) {
            self.destroyed += 1;
        }
    }

    #[test]
    fn test_shell_stdout_written_raw() {
        let mut adapter = TerminalAdapter::new(RecordingTerminal::default(), SessionMode::Shell);
        adapter
            .inbound(&InboundFrame::Text(r#"{"operation":"stdout","data":"$ "}"#.to_string()))
            .unwrap();
        assert_eq!(adapter.terminal().output, "$ ");
    }

    #[test]
    fn test_violation_leaves_terminal_untouched() {
        let mut adapter = TerminalAdapter::new(RecordingTerminal::default(), SessionMode::Shell);
        let result = adapter.inbound(&InboundFrame::Text(r#"{"operation":"ping"}"#.to_string()));
        assert!(result.is_err());
        assert_eq!(adapter.terminal().output, "");
    }

    #[test]
    fn test_log_frames_become_lines() {
        let mut adapter = TerminalAdapter::new(RecordingTerminal::default(), SessionMode::Logs);
        adapter.inbound(&InboundFrame::Text("first".to_string())).unwrap();
        adapter.inbound(&InboundFrame::Text("second".to_string())).unwrap();
        assert_eq!(adapter.terminal().output, "first\r\nsecond\r\n");
    }

    #[test]
    fn test_unsubscribed_adapter_is_inert() {
        let mut adapter = TerminalAdapter::new(RecordingTerminal::default(), SessionMode::Shell);
        adapter.unsubscribe();

        let frame = adapter.outbound(&TerminalEvent::Input("ls\r".to_string())).unwrap();
        assert_eq!(frame, None);

        adapter
            .inbound(&InboundFrame::Text(r#"{"operation":"stdout","data":"late"}"#.to_string()))
            .unwrap();
        assert_eq!(adapter.terminal().output, "");
    }

    #[test]
    fn test_destroy_is_idempotent_and_blocks_writes() {
        let mut adapter = TerminalAdapter::new(RecordingTerminal::default(), SessionMode::Logs);
        adapter.destroy();
        adapter.destroy();
        adapter.writeln("after");

        assert!(adapter.is_destroyed());
        assert_eq!(adapter.terminal().destroyed, 1);
        assert_eq!(adapter.terminal().output, "");
    }
}
