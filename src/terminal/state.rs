// ABOUTME: Session state machine governing the bridge lifecycle
// Idle → Connecting → Open → Closed, with Erroring as the fatal detour to Closed

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Identity resolved, no socket yet
    Idle,
    Connecting,
    Open,
    /// Transport failed; the terminal is being torn down
    Erroring,
    /// Terminal state, nothing further is accepted
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connect,
    TransportOpened,
    CleanClose,
    TransportFailed,
    TornDown,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid transition from {from:?} on {event:?}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub event: SessionEvent,
}

impl SessionState {
    /// Transition table. `None` means the event is not legal in this state.
    pub const fn next(self, event: SessionEvent) -> Option<Self> {
        match (self, event) {
            (Self::Idle, SessionEvent::Connect) => Some(Self::Connecting),
            (Self::Connecting, SessionEvent::TransportOpened) => Some(Self::Open),
            (Self::Open, SessionEvent::CleanClose) => Some(Self::Closed),
            (Self::Connecting | Self::Open, SessionEvent::TransportFailed) => Some(Self::Erroring),
            (Self::Erroring, SessionEvent::TornDown) => Some(Self::Closed),
            _ => None,
        }
    }

    /// Terminal input and inbound frames are only relayed while open
    pub const fn accepts_input(self) -> bool {
        matches!(self, Self::Open)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

#[derive(Debug)]
pub struct SessionStateMachine {
    state: SessionState,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    pub const fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionState, InvalidTransition> {
        let from = self.state;
        let to = from.next(event).ok_or(InvalidTransition { from, event })?;
        debug!("Session state {:?} -> {:?} on {:?}", from, to, event);
        self.state = to;
        Ok(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut machine = SessionStateMachine::new();
        assert_eq!(machine.state(), SessionState::Idle);

        assert_eq!(machine.apply(SessionEvent::Connect), Ok(SessionState::Connecting));
        assert_eq!(machine.apply(SessionEvent::TransportOpened), Ok(SessionState::Open));
        assert!(machine.state().accepts_input());
        assert_eq!(machine.apply(SessionEvent::CleanClose), Ok(SessionState::Closed));
        assert!(machine.state().is_terminal());
        assert!(!machine.state().accepts_input());
    }

    #[test]
    fn test_error_path_passes_through_erroring() {
        let mut machine = SessionStateMachine::new();
        machine.apply(SessionEvent::Connect).unwrap();
        machine.apply(SessionEvent::TransportOpened).unwrap();

        assert_eq!(machine.apply(SessionEvent::TransportFailed), Ok(SessionState::Erroring));
        assert!(!machine.state().accepts_input());
        assert_eq!(machine.apply(SessionEvent::TornDown), Ok(SessionState::Closed));
    }

    #[test]
    fn test_handshake_failure_while_connecting() {
        let mut machine = SessionStateMachine::new();
        machine.apply(SessionEvent::Connect).unwrap();
        assert_eq!(machine.apply(SessionEvent::TransportFailed), Ok(SessionState::Erroring));
    }

    #[test]
    fn test_closed_is_final() {
        let mut machine = SessionStateMachine::new();
        machine.apply(SessionEvent::Connect).unwrap();
        machine.apply(SessionEvent::TransportOpened).unwrap();
        machine.apply(SessionEvent::CleanClose).unwrap();

        for event in [
            SessionEvent::Connect,
            SessionEvent::TransportOpened,
            SessionEvent::CleanClose,
            SessionEvent::TransportFailed,
            SessionEvent::TornDown,
        ] {
            assert_eq!(
                machine.apply(event),
                Err(InvalidTransition {
                    from: SessionState::Closed,
                    event
                })
            );
        }
    }

    #[test]
    fn test_no_reconnect_or_skipping() {
        assert_eq!(SessionState::Idle.next(SessionEvent::TransportOpened), None);
        assert_eq!(SessionState::Open.next(SessionEvent::Connect), None);
        assert_eq!(SessionState::Connecting.next(SessionEvent::CleanClose), None);
        assert_eq!(SessionState::Open.next(SessionEvent::TornDown), None);
    }
}
