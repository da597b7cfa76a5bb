//! Status indicator
//!
//! A single RGB light next to the matrix that shows connection and activity
//! state. The colour table here is independent from the priority colours used for
//! message text, even though both draw from the same palette.

pub mod gpio;
pub mod log;

pub use gpio::GpioIndicator;
pub use log::LogIndicator;

use crate::color::Rgb;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum IndicatorError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),
}

/// Narrow interface to the indicator hardware.
pub trait Indicator: Send {
    fn set_color(&mut self, color: Rgb) -> Result<(), IndicatorError>;
}

/// Activity states the indicator can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Connecting,
    Connected,
    Error,
    Receiving,
    Off,
}

impl Status {
    pub const fn color(self) -> Rgb {
        match self {
            Status::Connecting => Rgb::YELLOW,
            Status::Connected => Rgb::GREEN,
            Status::Error => Rgb::RED,
            Status::Receiving => Rgb::BLUE,
            Status::Off => Rgb::BLACK,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Connecting => write!(f, "connecting"),
            Status::Connected => write!(f, "connected"),
            Status::Error => write!(f, "error"),
            Status::Receiving => write!(f, "receiving"),
            Status::Off => write!(f, "off"),
        }
    }
}

/// Last-write-wins wrapper around an [`Indicator`] backend.
///
/// Hardware failures are logged and swallowed; the light is cosmetic and must
/// never stop the main loop.
pub struct StatusIndicator {
    backend: Box<dyn Indicator>,
    last: Option<Rgb>,
}

impl StatusIndicator {
    pub fn new(backend: Box<dyn Indicator>) -> Self {
        Self {
            backend,
            last: None,
        }
    }

    pub fn set(&mut self, color: Rgb) {
        if self.last != Some(color) {
            debug!("Status light changing to {}", color);
        }
        match self.backend.set_color(color) {
            Ok(()) => self.last = Some(color),
            Err(e) => warn!("Failed to set status light to {}: {}", color, e),
        }
    }

    pub fn show(&mut self, status: Status) {
        self.set(status.color());
    }

    /// Colour most recently written successfully.
    #[cfg(test)]
    pub fn last(&self) -> Option<Rgb> {
        self.last
    }
}
