//! Connection resilience state machine
//!
//! Owns the single [`ConnectionState`] of the process and walks it one step per
//! call to [`ConnectionStateMachine::advance`]:
//!
//! ```text
//! Disconnected ──► ConnectingLink ──► ConnectingBroker ──► Connected
//!      ▲                 │   ▲               │                │  │
//!      │                 ▼   │               ▼                │  │
//!      │             ErrorBackoff ◄──────────┴────────────────┘  │
//!      │          (fixed delay, then retry)                      │
//!      └─────────────────────────── link lost ───────────────────┘
//! ```
//!
//! Every state change drives the status indicator. There is no retry ceiling
//! and no exponential growth of the delay.

use super::broker::{Broker, BrokerError, QoS};
use super::link::{LinkError, NetworkLink};
use super::state::{ConnectionEvent, ConnectionState};
use crate::indicator::{Status, StatusIndicator};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("wireless link: {0}")]
    Link(#[from] LinkError),

    #[error("broker: {0}")]
    Broker(#[from] BrokerError),
}

impl ConnectionError {
    pub fn is_fatal(&self) -> bool {
        match self {
            ConnectionError::Link(e) => e.is_fatal(),
            ConnectionError::Broker(e) => e.is_fatal(),
        }
    }

    fn event(&self) -> ConnectionEvent {
        match self {
            ConnectionError::Link(_) => ConnectionEvent::LinkFailed,
            ConnectionError::Broker(_) => ConnectionEvent::BrokerFailed,
        }
    }
}

/// What the machine needs to (re)build a session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ssid: String,
    pub password: String,
    pub topic: String,
    pub backoff: Duration,
}

pub struct ConnectionStateMachine {
    state: ConnectionState,
    settings: SessionSettings,
    indicator: StatusIndicator,
    retry_at: Option<Instant>,
    // First session uses connect(), later ones reconnect().
    session_opened: bool,
}

impl ConnectionStateMachine {
    pub fn new(settings: SessionSettings, indicator: StatusIndicator) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            settings,
            indicator,
            retry_at: None,
            session_opened: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Time left before the next retry, `None` outside of backoff.
    pub fn backoff_remaining(&self, now: Instant) -> Option<Duration> {
        match (self.state, self.retry_at) {
            (ConnectionState::ErrorBackoff, Some(at)) => Some(at.saturating_duration_since(now)),
            _ => None,
        }
    }

    /// Performs at most one transition.
    ///
    /// On failure the machine is already in `ErrorBackoff` when the error is
    /// returned; the caller only decides whether it is fatal.
    pub async fn advance(
        &mut self,
        link: &mut dyn NetworkLink,
        broker: &mut dyn Broker,
        now: Instant,
    ) -> Result<(), ConnectionError> {
        let outcome = self.step(link, broker, now).await;
        if let Err(e) = &outcome {
            self.fail(now, e);
        }
        outcome
    }

    async fn step(
        &mut self,
        link: &mut dyn NetworkLink,
        broker: &mut dyn Broker,
        now: Instant,
    ) -> Result<(), ConnectionError> {
        match self.state {
            ConnectionState::Disconnected => self.apply(ConnectionEvent::Start),

            ConnectionState::ConnectingLink => {
                if link.is_connected() {
                    debug!("Wireless link already up");
                } else {
                    link.connect(&self.settings.ssid, &self.settings.password)
                        .await?;
                }
                self.apply(ConnectionEvent::LinkUp);
            }

            ConnectionState::ConnectingBroker => {
                if self.session_opened {
                    broker.reconnect().await?;
                } else {
                    broker.connect().await?;
                    self.session_opened = true;
                }
                broker.subscribe(&self.settings.topic, QoS::AtLeastOnce).await?;
                self.apply(ConnectionEvent::SessionReady);
            }

            ConnectionState::Connected => {
                if !link.is_connected() {
                    warn!("Wireless link lost");
                    self.apply(ConnectionEvent::LinkLost);
                } else if !broker.is_connected() {
                    return Err(BrokerError::Disconnected.into());
                }
            }

            ConnectionState::ErrorBackoff => {
                if self.retry_at.map_or(true, |at| now >= at) {
                    self.retry_at = None;
                    self.apply(ConnectionEvent::BackoffElapsed);
                }
            }
        }
        Ok(())
    }

    /// Records a failure reported from outside, e.g. by a broker poll.
    pub fn fail(&mut self, now: Instant, error: &ConnectionError) {
        error!("Connection error: {}", error);
        let before = self.state;
        self.apply(error.event());
        if self.state == ConnectionState::ErrorBackoff && before != ConnectionState::ErrorBackoff {
            self.retry_at = Some(now + self.settings.backoff);
            info!("Retrying in {:?}", self.settings.backoff);
        }
    }

    /// Shows the transient "message received" colour.
    pub fn indicate(&mut self, status: Status) {
        self.indicator.show(status);
    }

    /// Puts the indicator back to the colour of the current state.
    pub fn restore_indicator(&mut self) {
        if let Some(status) = self.state.status() {
            self.indicator.show(status);
        }
    }

    fn apply(&mut self, event: ConnectionEvent) {
        let next = self.state.transition(event);
        if next == self.state {
            return;
        }
        info!("Connection {} -> {}", self.state, next);
        self.state = next;
        self.restore_indicator();
    }
}
