//! Node settings from environment variables.

use std::env;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::control::SAMPLE_INTERVAL_MS;
use crate::sampler::Calibration;
use crate::valve::ServoAngles;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub serial_port: String,
    pub baud_rate: u32,
    pub sample_interval_ms: u64,
    pub calibration: Calibration,
    pub servo: ServoAngles,
    /// `SIM_SCENARIO`, only used by the simulator backend.
    pub sim_scenario: String,
    pub hardware: HardwarePins,
}

/// Raspberry Pi wiring for the `hw` backend.
#[derive(Debug, Clone)]
pub struct HardwarePins {
    pub servo_gpio: u8,
    pub soil_power_gpio: u8,
    pub soil_adc_addr: u16,
    pub soil_adc_channel: u8,
    pub climate_iio_dir: String,
}

impl NodeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes `std::env`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let cfg = Self {
            serial_port: get("SERIAL_PORT", "/dev/ttyS0"),
            baud_rate: parse(&lookup, "BAUD_RATE", 9600)?,
            sample_interval_ms: parse(&lookup, "SAMPLE_INTERVAL_MS", SAMPLE_INTERVAL_MS)?,
            calibration: Calibration {
                raw_dry: parse(&lookup, "SOIL_RAW_DRY", Calibration::default().raw_dry)?,
                raw_wet: parse(&lookup, "SOIL_RAW_WET", Calibration::default().raw_wet)?,
            },
            servo: ServoAngles {
                open: parse(&lookup, "SERVO_OPEN_DEG", ServoAngles::default().open)?,
                closed: parse(&lookup, "SERVO_CLOSED_DEG", ServoAngles::default().closed)?,
            },
            sim_scenario: get("SIM_SCENARIO", "drying"),
            hardware: HardwarePins {
                servo_gpio: parse(&lookup, "SERVO_GPIO", 18)?,
                soil_power_gpio: parse(&lookup, "SOIL_POWER_GPIO", 23)?,
                soil_adc_addr: parse_hex_or_dec(&lookup, "SOIL_ADC_ADDR", 0x48)?,
                soil_adc_channel: parse(&lookup, "SOIL_ADC_CHANNEL", 0)?,
                climate_iio_dir: get("CLIMATE_IIO_DIR", crate::iio::DEFAULT_DIR),
            },
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the loop cannot work with, reporting all of them.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.serial_port.trim().is_empty() {
            errors.push("SERIAL_PORT is empty".to_string());
        }
        if self.baud_rate == 0 {
            errors.push("BAUD_RATE must be positive".to_string());
        }
        if self.sample_interval_ms == 0 {
            errors.push("SAMPLE_INTERVAL_MS must be positive".to_string());
        }
        if self.calibration.raw_dry == self.calibration.raw_wet {
            errors.push(format!(
                "SOIL_RAW_DRY and SOIL_RAW_WET are both {}; calibration range is zero",
                self.calibration.raw_dry
            ));
        }
        if self.servo.open > 180 || self.servo.closed > 180 {
            errors.push(format!(
                "servo angles must be within 0-180 (open {}, closed {})",
                self.servo.open, self.servo.closed
            ));
        }
        if self.servo.open == self.servo.closed {
            errors.push("SERVO_OPEN_DEG and SERVO_CLOSED_DEG are equal".to_string());
        }
        if self.hardware.soil_adc_channel > 3 {
            errors.push(format!(
                "SOIL_ADC_CHANNEL {} out of range (0-3)",
                self.hardware.soil_adc_channel
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "node config invalid ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {v:?}")),
        _ => Ok(default),
    }
}

fn parse_hex_or_dec(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u16,
) -> Result<u16> {
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => {
            let v = v.trim();
            let parsed = match v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
                Some(hex) => u16::from_str_radix(hex, 16),
                None => v.parse(),
            };
            parsed.with_context(|| format!("invalid {key}: {v:?}"))
        }
        _ => Ok(default),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
