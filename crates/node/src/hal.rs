//! Hardware seams for the node.
//!
//! Blocking delays and plain digital outputs come from `embedded-hal`; the
//! rest (servo, climate sensor, analog soil sensor, clock, serial link) are
//! small traits local to this crate so the control loop can run against the
//! simulator, the Raspberry Pi backend, or test fakes.

use std::fmt;
use std::time::Instant;

pub use embedded_hal::delay::DelayNs;
pub use embedded_hal::digital::OutputPin;

/// Monotonic millisecond clock, starting near zero at boot.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Positional hobby servo driving the valve.
pub trait Servo {
    type Error: fmt::Debug;

    fn write_angle(&mut self, degrees: u8) -> Result<(), Self::Error>;
}

/// Digital temperature/humidity sensor (DHT-class).
///
/// A failed read returns `f32::NAN`; callers pass the sentinel through.
pub trait ClimateSensor {
    fn read_humidity(&mut self) -> f32;
    fn read_temperature(&mut self) -> f32;
}

/// Single analog input wired to the soil sensor.
pub trait AnalogInput {
    type Error: fmt::Debug;

    fn read_raw(&mut self) -> Result<u16, Self::Error>;
}

/// Byte-oriented serial channel shared by commands and telemetry.
pub trait Link {
    /// Next buffered input byte, or `None` when nothing is waiting.
    /// Must not block.
    fn read_byte(&mut self) -> Option<u8>;

    /// Write one line followed by `\r\n`.
    fn write_line(&mut self, line: &str);
}

// ---------------------------------------------------------------------------
// Host implementations
// ---------------------------------------------------------------------------

/// [`Clock`] backed by `std::time::Instant`.
pub struct MonotonicClock {
    boot: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            boot: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }
}

/// [`DelayNs`] that parks the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDelay;

impl DelayNs for ThreadDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(ns as u64));
    }
}
