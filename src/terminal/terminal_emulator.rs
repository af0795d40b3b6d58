// ABOUTME: Local terminal standing in for the terminal-emulator widget
// Writes session output to the operator's terminal and restores it on teardown

use crate::terminal::adapter::TerminalSink;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{self, Stdout, Write};
use tracing::{debug, warn};

/// Terminal widget backed by a writer, normally the process's stdout in raw mode
pub struct LocalTerminal<W: Write = Stdout> {
    out: W,
    /// Raw mode was enabled by us and must be undone
    raw: bool,
    destroyed: bool,
}

impl LocalTerminal<Stdout> {
    /// Take over stdout in raw mode, so keystrokes reach the session unprocessed
    pub fn open() -> io::Result<Self> {
        enable_raw_mode()?;
        debug!("Raw mode enabled");
        Ok(Self {
            out: io::stdout(),
            raw: true,
            destroyed: false,
        })
    }
}

impl<W: Write> LocalTerminal<W> {
    /// Wrap an arbitrary writer; raw mode is left alone
    pub const fn with_writer(out: W) -> Self {
        Self {
            out,
            raw: false,
            destroyed: false,
        }
    }

    pub const fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub const fn writer(&self) -> &W {
        &self.out
    }

    fn restore(&mut self) {
        if self.raw {
            if let Err(e) = disable_raw_mode() {
                warn!("Failed to leave raw mode: {}", e);
            }
            self.raw = false;
            debug!("Raw mode disabled");
        }
    }
}

impl<W: Write> TerminalSink for LocalTerminal<W> {
    fn write(&mut self, data: &str) -> io::Result<()> {
        if self.destroyed {
            return Ok(());
        }
        self.out.write_all(data.as_bytes())?;
        self.out.flush()
    }

    fn writeln(&mut self, line: &str) -> io::Result<()> {
        if self.destroyed {
            return Ok(());
        }
        // Raw mode does no newline translation
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\r\n")?;
        self.out.flush()
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        let _ = self.out.flush();
        self.restore();
        self.destroyed = true;
    }
}

impl<W: Write> Drop for LocalTerminal<W> {
    fn drop(&mut self) {
        let _ = self.out.flush();
        self.restore();
    }
}
