//! SmartPot node firmware.
//!
//! A single cooperative loop ([`control::Controller`]) listens for the `go`
//! command on the serial link, toggles the valve, and prints a sensor
//! reading every sampling interval. Hardware is reached only through the
//! traits in [`hal`].

pub mod command;
pub mod config;
pub mod control;
pub mod hal;
pub mod iio;
pub mod link;
pub mod sampler;
pub mod valve;

#[cfg(feature = "hw")]
pub mod adc;
#[cfg(feature = "hw")]
pub mod servo;
#[cfg(feature = "sim")]
pub mod sim;
