//! Connection state definition
//!
//! The transition table is a pure function of the current state and an event;
//! side effects (indicator, I/O) live in the machine that applies it.

use crate::indicator::Status;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Nothing attempted yet, or the wireless link dropped
    #[default]
    Disconnected,
    /// Associating with the access point
    ConnectingLink,
    /// Opening the broker session and subscribing
    ConnectingBroker,
    /// Session up, polling for messages
    Connected,
    /// Waiting out the retry delay after a failure
    ErrorBackoff,
}

/// Outcomes that move the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Start,
    LinkUp,
    LinkFailed,
    SessionReady,
    BrokerFailed,
    LinkLost,
    BackoffElapsed,
}

impl ConnectionState {
    pub fn transition(self, event: ConnectionEvent) -> Self {
        use ConnectionEvent::*;
        use ConnectionState::*;

        match (self, event) {
            (Disconnected, Start) => ConnectingLink,

            (ConnectingLink, LinkUp) => ConnectingBroker,

            (ConnectingBroker, SessionReady) => Connected,

            (Connected, LinkLost) => Disconnected,

            (ConnectingLink | ConnectingBroker | Connected, LinkFailed | BrokerFailed) => {
                ErrorBackoff
            }

            (ErrorBackoff, BackoffElapsed) => ConnectingLink,

            // Everything else is ignored
            (state, _) => state,
        }
    }

    /// Indicator colour while in this state; `None` leaves the light untouched.
    pub const fn status(self) -> Option<Status> {
        match self {
            ConnectionState::Disconnected => None,
            ConnectionState::ConnectingLink | ConnectionState::ConnectingBroker => {
                Some(Status::Connecting)
            }
            ConnectionState::Connected => Some(Status::Connected),
            ConnectionState::ErrorBackoff => Some(Status::Error),
        }
    }

    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::ConnectingLink => "ConnectingLink",
            ConnectionState::ConnectingBroker => "ConnectingBroker",
            ConnectionState::Connected => "Connected",
            ConnectionState::ErrorBackoff => "ErrorBackoff",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionEvent::*;
    use super::ConnectionState::*;
    use super::*;

    #[test]
    fn happy_path() {
        let s = Disconnected.transition(Start);
        assert_eq!(s, ConnectingLink);
        let s = s.transition(LinkUp);
        assert_eq!(s, ConnectingBroker);
        let s = s.transition(SessionReady);
        assert_eq!(s, Connected);
    }

    #[test]
    fn failures_enter_backoff() {
        assert_eq!(ConnectingLink.transition(LinkFailed), ErrorBackoff);
        assert_eq!(ConnectingBroker.transition(BrokerFailed), ErrorBackoff);
        assert_eq!(Connected.transition(BrokerFailed), ErrorBackoff);
    }

    #[test]
    fn backoff_returns_to_link() {
        assert_eq!(ErrorBackoff.transition(BackoffElapsed), ConnectingLink);
        assert_eq!(ErrorBackoff.transition(BrokerFailed), ErrorBackoff);
    }

    #[test]
    fn link_loss_disconnects() {
        assert_eq!(Connected.transition(LinkLost), Disconnected);
        assert_eq!(Disconnected.transition(Start), ConnectingLink);
    }

    #[test]
    fn no_terminal_state() {
        for state in [
            Disconnected,
            ConnectingLink,
            ConnectingBroker,
            Connected,
            ErrorBackoff,
        ] {
            let reachable = [
                Start,
                LinkUp,
                LinkFailed,
                SessionReady,
                BrokerFailed,
                LinkLost,
                BackoffElapsed,
            ]
            .iter()
            .any(|e| state.transition(*e) != state);
            assert!(reachable, "{state} has no way out");
        }
    }

    #[test]
    fn out_of_order_events_are_ignored() {
        assert_eq!(Disconnected.transition(SessionReady), Disconnected);
        assert_eq!(ConnectingLink.transition(SessionReady), ConnectingLink);
        assert_eq!(Connected.transition(LinkUp), Connected);
    }

    #[test]
    fn indicator_colours_follow_state() {
        assert_eq!(ConnectingLink.status(), Some(Status::Connecting));
        assert_eq!(ConnectingBroker.status(), Some(Status::Connecting));
        assert_eq!(Connected.status(), Some(Status::Connected));
        assert_eq!(ErrorBackoff.status(), Some(Status::Error));
        assert_eq!(Disconnected.status(), None);
    }
}
