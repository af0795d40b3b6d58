// ABOUTME: Translates local crossterm input into terminal events for a session
// Keys become the byte sequences a remote PTY expects; some keys detach locally

use crate::identity::SessionMode;
use crate::terminal::adapter::TerminalEvent;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures_util::stream::{self, LocalBoxStream};
use futures_util::{future, StreamExt};
use tracing::{info, warn};

/// What a local input event means for the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Forward(TerminalEvent),
    /// Discard the session and return to the shell
    Detach,
}

/// Map one crossterm event. Returns `None` for events with no meaning here.
pub fn translate(event: &Event, mode: SessionMode) -> Option<InputAction> {
    match event {
        Event::Key(key) => {
            if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                return None;
            }
            if is_detach(key, mode) {
                return Some(InputAction::Detach);
            }
            key_bytes(key).map(|bytes| InputAction::Forward(TerminalEvent::Input(bytes)))
        }
        Event::Paste(text) => Some(InputAction::Forward(TerminalEvent::Input(text.clone()))),
        Event::Resize(cols, rows) => Some(InputAction::Forward(TerminalEvent::Resize {
            cols: *cols,
            rows: *rows,
        })),
        Event::Mouse(_) | Event::FocusGained | Event::FocusLost => None,
    }
}

/// `Ctrl+]` detaches in every mode. Log views also detach on `q` and `Ctrl+C`,
/// since they relay no input.
pub fn is_detach(key: &KeyEvent, mode: SessionMode) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char(']' | '5') if ctrl => true,
        KeyCode::Char('c') if ctrl => mode == SessionMode::Logs,
        KeyCode::Char('q') if key.modifiers.is_empty() => mode == SessionMode::Logs,
        _ => false,
    }
}

/// Byte sequence an xterm sends for this key
pub fn key_bytes(key: &KeyEvent) -> Option<String> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    let bytes = match key.code {
        KeyCode::Char(c) if ctrl => control_char(c)?.to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "\r".to_string(),
        KeyCode::Tab => "\t".to_string(),
        KeyCode::BackTab => "\x1b[Z".to_string(),
        KeyCode::Backspace => "\x7f".to_string(),
        KeyCode::Esc => "\x1b".to_string(),
        KeyCode::Up => "\x1b[A".to_string(),
        KeyCode::Down => "\x1b[B".to_string(),
        KeyCode::Right => "\x1b[C".to_string(),
        KeyCode::Left => "\x1b[D".to_string(),
        KeyCode::Home => "\x1b[H".to_string(),
        KeyCode::End => "\x1b[F".to_string(),
        KeyCode::Insert => "\x1b[2~".to_string(),
        KeyCode::Delete => "\x1b[3~".to_string(),
        KeyCode::PageUp => "\x1b[5~".to_string(),
        KeyCode::PageDown => "\x1b[6~".to_string(),
        KeyCode::F(n) => function_key(n)?.to_string(),
        _ => return None,
    };

    if alt && !ctrl {
        return Some(format!("\x1b{bytes}"));
    }
    Some(bytes)
}

fn control_char(c: char) -> Option<char> {
    match c.to_ascii_lowercase() {
        lower @ 'a'..='z' => Some(char::from(lower as u8 & 0x1f)),
        ' ' | '@' | '2' => Some('\0'),
        '[' | '3' => Some('\x1b'),
        '\\' | '4' => Some('\x1c'),
        '^' | '6' => Some('\x1e'),
        '_' | '7' => Some('\x1f'),
        _ => None,
    }
}

const fn function_key(n: u8) -> Option<&'static str> {
    match n {
        1 => Some("\x1bOP"),
        2 => Some("\x1bOQ"),
        3 => Some("\x1bOR"),
        4 => Some("\x1bOS"),
        5 => Some("\x1b[15~"),
        6 => Some("\x1b[17~"),
        7 => Some("\x1b[18~"),
        8 => Some("\x1b[19~"),
        9 => Some("\x1b[20~"),
        10 => Some("\x1b[21~"),
        11 => Some("\x1b[23~"),
        12 => Some("\x1b[24~"),
        _ => None,
    }
}

/// Terminal events from the operator's terminal, starting with its current size.
/// The stream ends when the operator detaches.
pub fn terminal_events(mode: SessionMode) -> LocalBoxStream<'static, TerminalEvent> {
    let initial = crossterm::terminal::size()
        .ok()
        .map(|(cols, rows)| InputAction::Forward(TerminalEvent::Resize { cols, rows }));

    let live = EventStream::new().filter_map(move |event| {
        future::ready(match event {
            Ok(event) => translate(&event, mode),
            Err(e) => {
                warn!("Terminal input error: {}", e);
                Some(InputAction::Detach)
            }
        })
    });

    stream::iter(initial)
        .chain(live)
        .take_while(|action| {
            let keep = !matches!(action, InputAction::Detach);
            if !keep {
                info!("Detach requested");
            }
            future::ready(keep)
        })
        .filter_map(|action| {
            future::ready(match action {
                InputAction::Forward(event) => Some(event),
                InputAction::Detach => None,
            })
        })
        .boxed_local()
}
