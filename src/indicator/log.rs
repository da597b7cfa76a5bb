use super::{Indicator, IndicatorError};
use crate::color::Rgb;
use tracing::info;

/// Indicator backend for hosts without an LED.
#[derive(Debug, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn set_color(&mut self, color: Rgb) -> Result<(), IndicatorError> {
        info!("Status light -> {}", color);
        Ok(())
    }
}
