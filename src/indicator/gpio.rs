use super::{Indicator, IndicatorError};
use crate::color::Rgb;
use rppal::gpio::{Gpio, OutputPin};
use tracing::{debug, info};

const PWM_FREQUENCY_HZ: f64 = 200.0;

/// Common-cathode RGB LED on three GPIO pins, dimmed with software PWM.
pub struct GpioIndicator {
    pins: [OutputPin; 3],
    brightness: f64,
}

impl GpioIndicator {
    pub fn new(red: u8, green: u8, blue: u8, brightness: f64) -> Result<Self, IndicatorError> {
        let gpio = Gpio::new()?;
        let pins = [
            gpio.get(red)?.into_output_low(),
            gpio.get(green)?.into_output_low(),
            gpio.get(blue)?.into_output_low(),
        ];
        info!(
            "Status light on GPIO {}/{}/{} at brightness {:.2}",
            red, green, blue, brightness
        );
        Ok(Self { pins, brightness })
    }
}

impl Indicator for GpioIndicator {
    fn set_color(&mut self, color: Rgb) -> Result<(), IndicatorError> {
        debug!("Status light -> {}", color);
        for (pin, level) in self.pins.iter_mut().zip(color.fractions()) {
            let duty = level * self.brightness;
            if duty > 0.0 {
                pin.set_pwm_frequency(PWM_FREQUENCY_HZ, duty)?;
            } else {
                pin.clear_pwm()?;
                pin.set_low();
            }
        }
        Ok(())
    }
}
