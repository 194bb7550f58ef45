//! Hobby servo and sensor supply on Raspberry Pi GPIO via `rppal`.

use std::time::Duration;

use rppal::gpio::{Gpio, OutputPin};

use crate::hal::Servo;

/// 50 Hz servo frame.
const PERIOD: Duration = Duration::from_millis(20);
/// Pulse width at 0° and 180°.
const MIN_PULSE_US: u64 = 500;
const MAX_PULSE_US: u64 = 2_500;

fn pulse_for(degrees: u8) -> Duration {
    let degrees = degrees.min(180) as u64;
    Duration::from_micros(MIN_PULSE_US + (MAX_PULSE_US - MIN_PULSE_US) * degrees / 180)
}

/// Servo on a GPIO pin driven by rppal's software PWM.
pub struct PiServo {
    pin: OutputPin,
}

impl PiServo {
    pub fn new(gpio: &Gpio, bcm_pin: u8) -> anyhow::Result<Self> {
        let pin = gpio.get(bcm_pin)?.into_output_low();
        tracing::info!(gpio = bcm_pin, "servo pin ready");
        Ok(Self { pin })
    }
}

impl Servo for PiServo {
    type Error = rppal::gpio::Error;

    fn write_angle(&mut self, degrees: u8) -> Result<(), Self::Error> {
        self.pin.set_pwm(PERIOD, pulse_for(degrees))
    }
}

/// Soil sensor supply. rppal's `OutputPin` implements the embedded-hal
/// digital traits directly; this only claims it in the off state.
pub fn sensor_power(gpio: &Gpio, bcm_pin: u8) -> anyhow::Result<OutputPin> {
    Ok(gpio.get(bcm_pin)?.into_output_low())
}
