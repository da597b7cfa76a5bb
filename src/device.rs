//! Device orchestrator with statum typestate lifecycle
//!
//! Owns every piece of mutable state in the process (current message, layout,
//! connection state) and drives them from a single task.
//!
//! # Lifecycle
//!
//! ```text
//! Booting ──► Running ──► (shutdown: display cleared, light off)
//!    │
//!    └── fatal link/broker error or bad config ──► process exits
//! ```
//!
//! # One iteration
//!
//! ```text
//! advance connection ──► poll broker (if connected) ──► decode ──► render
//!         ▲                                                          │
//!         └──────── wait out backoff ◄──── scroll tick ◄─────────────┘
//! ```

use crate::config::{Config, ConfigError};
use crate::connection::{
    Broker, BrokerError, BrokerEvent, ConnectionError, ConnectionState, ConnectionStateMachine,
    NetworkLink, SessionSettings,
};
use crate::display::{Display, DisplayRenderer, RenderError};
use crate::indicator::{Status, StatusIndicator};
use crate::message::{decode, Message};
use statum::{machine, state};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Errors that stop the device from starting.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
}

#[state]
#[derive(Debug, Clone)]
pub enum DeviceState {
    Booting, // Config validated, connection not up yet
    Running, // Main loop
}

/// Loop timings taken from the configuration.
#[derive(Debug, Clone, Copy)]
struct Timings {
    poll_interval: Duration,
    receive_flash: Duration,
}

#[machine]
pub struct Device<S: DeviceState> {
    timings: Timings,
    link: Box<dyn NetworkLink>,
    broker: Box<dyn Broker>,
    display: Box<dyn Display>,
    renderer: DisplayRenderer,
    connection: ConnectionStateMachine,
    current: Option<Message>,
    render_failed: bool,
}

#[cfg(test)]
impl<S: DeviceState> Device<S> {
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn current_message(&self) -> Option<&Message> {
        self.current.as_ref()
    }
}

impl<S: DeviceState> Device<S> {
    fn redraw(&mut self, now: Instant) {
        let result = self
            .renderer
            .show(self.display.as_mut(), self.current.as_ref(), now);
        match result {
            Ok(()) => self.render_recovered(),
            Err(e) => self.render_error(e),
        }
    }

    /// Advances the scroll animation and retries a failed draw.
    fn refresh(&mut self, now: Instant) {
        match self.renderer.tick(self.display.as_mut(), now) {
            Ok(true) => self.render_recovered(),
            Ok(false) => {}
            Err(e) => self.render_error(e),
        }
    }

    fn render_error(&mut self, e: RenderError) {
        error!("Render failed: {}", e);
        self.render_failed = true;
        self.connection.indicate(Status::Error);
    }

    fn render_recovered(&mut self) {
        if self.render_failed {
            info!("Display recovered");
            self.render_failed = false;
            self.connection.restore_indicator();
        }
    }
}

impl Device<Booting> {
    /// Validates the configuration and wires up the collaborators.
    ///
    /// The placeholder, if configured, becomes the initial current message.
    pub fn create(
        config: &Config,
        link: Box<dyn NetworkLink>,
        broker: Box<dyn Broker>,
        display: Box<dyn Display>,
        indicator: StatusIndicator,
    ) -> Result<Self, DeviceError> {
        config.validate()?;
        let (width, height) = (display.width(), display.height());
        info!(
            "Creating device for topic {} on a {}x{} panel",
            config.mqtt.topic, width, height
        );

        let session = SessionSettings {
            ssid: config.wifi.ssid.clone(),
            password: config.wifi.password.clone(),
            topic: config.mqtt.topic.clone(),
            backoff: config.retry.backoff(),
        };
        let placeholder = Some(config.display.placeholder.as_str())
            .filter(|text| !text.is_empty())
            .map(Message::plain);

        Ok(Self::new(
            Timings {
                poll_interval: config.mqtt.poll_interval(),
                receive_flash: config.indicator.receive_flash(),
            },
            link,
            broker,
            display,
            DisplayRenderer::new(config.display.scroll(), Instant::now()),
            ConnectionStateMachine::new(session, indicator),
            placeholder,
            false, // render_failed
        ))
    }

    /// Shows the placeholder and makes the first connection attempt.
    ///
    /// Stops at `Connected` or at the first retryable failure; the main loop
    /// takes over from there. Only errors that no retry can fix are returned.
    pub async fn bring_up(mut self) -> Result<Device<Running>, DeviceError> {
        info!("Bringing device up");
        self.redraw(Instant::now());

        loop {
            let result = self
                .connection
                .advance(self.link.as_mut(), self.broker.as_mut(), Instant::now())
                .await;
            match result {
                Ok(()) => {}
                Err(e) if e.is_fatal() => {
                    error!("Cannot start: {}", e);
                    return Err(e.into());
                }
                Err(e) => warn!("First connection attempt failed: {}", e),
            }

            match self.connection.state() {
                ConnectionState::Connected | ConnectionState::ErrorBackoff => break,
                _ => {}
            }
        }

        info!("Device running ({})", self.connection.state());
        Ok(self.transition())
    }
}

impl Device<Running> {
    /// One pass of the main loop.
    ///
    /// Never fails: every link or broker error is turned into a backoff.
    pub async fn run_iteration(&mut self) {
        let result = self
            .connection
            .advance(self.link.as_mut(), self.broker.as_mut(), Instant::now())
            .await;
        if let Err(e) = result {
            debug!("Connection step failed: {}", e);
        }

        let mut failed_now = false;
        if self.connection.state().is_connected() {
            let timeout = match self.renderer.frame_interval() {
                Some(frame) => frame.min(self.timings.poll_interval),
                None => self.timings.poll_interval,
            };
            match self.broker.poll(timeout).await {
                Ok(events) => {
                    for event in events {
                        self.handle_event(event).await;
                        failed_now = self.render_failed;
                    }
                }
                Err(e) => self.connection.fail(Instant::now(), &e.into()),
            }
        }

        // A draw that just failed is retried on the next pass, not this one.
        if !failed_now {
            self.refresh(Instant::now());
        }

        if let Some(wait) = self.connection.backoff_remaining(Instant::now()) {
            // Wake up for scroll frames while waiting.
            let wait = match self.renderer.frame_interval() {
                Some(frame) => wait.min(frame),
                None => wait,
            };
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }
    }

    async fn handle_event(&mut self, event: BrokerEvent) {
        match event {
            BrokerEvent::Message { topic, payload } => {
                let message = decode(&payload);
                info!(
                    "Message on {} [{}]: {}",
                    topic,
                    message.priority(),
                    message.text()
                );

                self.connection.indicate(Status::Receiving);
                self.current = Some(message);
                self.redraw(Instant::now());

                tokio::time::sleep(self.timings.receive_flash).await;
                if !self.render_failed {
                    self.connection.restore_indicator();
                }
            }
            BrokerEvent::Disconnected => {
                warn!("Broker closed the session");
                self.connection
                    .fail(Instant::now(), &BrokerError::Disconnected.into());
            }
        }
    }

    /// Runs the main loop until `shutdown` is cancelled, then blanks the
    /// display and switches the status light off.
    pub async fn run_until_shutdown(mut self, shutdown: CancellationToken) {
        info!("Starting main loop");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }

                _ = self.run_iteration() => {}
            }
        }

        if let Err(e) = self.display.clear() {
            warn!("Failed to clear display on shutdown: {}", e);
        }
        self.connection.indicate(Status::Off);
        info!("Device stopped");
    }
}
