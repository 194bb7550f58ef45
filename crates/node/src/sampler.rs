//! Climate + soil sampling.
//!
//! The soil sensor is only powered for the duration of the analog read to
//! slow electrode corrosion. Each sub-step is followed by a short settle.

use std::fmt;

use crate::hal::{AnalogInput, ClimateSensor, DelayNs, OutputPin};

/// Sensor-internal stabilisation time between sub-steps.
pub const SETTLE_MS: u32 = 50;

/// Separator line printed before every reading block.
pub const BANNER: &str = "--------------------";

/// Raw analog values for bone-dry soil and for a sensor in water.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub raw_dry: u16,
    pub raw_wet: u16,
}

impl Calibration {
    /// Capacitive sensor on a 10-bit ADC referenced to its supply.
    pub const TEN_BIT: Self = Self {
        raw_dry: 1023,
        raw_wet: 300,
    };

    /// Capacitive sensor on an ADS1115 at PGA ±4.096 V.
    pub const ADS1115: Self = Self {
        raw_dry: 26000,
        raw_wet: 12000,
    };
}

/// Matches the ADC the enabled backend reads from.
impl Default for Calibration {
    fn default() -> Self {
        if cfg!(feature = "hw") {
            Self::ADS1115
        } else {
            Self::TEN_BIT
        }
    }
}

/// Linear map of `raw` from `[raw_dry, raw_wet]` onto `[0, 100]`.
/// Values beyond either end saturate.
pub fn soil_percent(raw: u16, cal: Calibration) -> u8 {
    let span = cal.raw_wet as i32 - cal.raw_dry as i32;
    if span == 0 {
        return 0;
    }
    let pct = (raw as i32 - cal.raw_dry as i32) * 100 / span;
    pct.clamp(0, 100) as u8
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Degrees Celsius, `NaN` when the sensor did not answer.
    pub temperature: f32,
    /// Relative humidity in percent, `NaN` when the sensor did not answer.
    pub humidity: f32,
    /// Soil moisture percent, `None` when the ADC read failed.
    pub soil_moisture: Option<u8>,
}

impl Reading {
    /// The reading as it goes out on the serial link.
    pub fn lines(&self) -> [String; 4] {
        let soil = match self.soil_moisture {
            Some(pct) => pct.to_string(),
            None => "nan".to_string(),
        };
        [
            BANNER.to_string(),
            format!("Temp: {:.2} C", self.temperature),
            format!("Humi: {:.2} %", self.humidity),
            format!("Soil: {soil} %"),
        ]
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}

pub struct Sampler<C, A, P> {
    climate: C,
    sensor: A,
    sensor_power: P,
    calibration: Calibration,
}

impl<C, A, P> Sampler<C, A, P>
where
    C: ClimateSensor,
    A: AnalogInput,
    P: OutputPin,
{
    pub fn new(climate: C, sensor: A, sensor_power: P, calibration: Calibration) -> Self {
        Self {
            climate,
            sensor,
            sensor_power,
            calibration,
        }
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// Take one full reading. Blocks for roughly `3 * SETTLE_MS`.
    pub fn sample(&mut self, delay: &mut impl DelayNs) -> Reading {
        let humidity = self.climate.read_humidity();
        delay.delay_ms(SETTLE_MS);
        let temperature = self.climate.read_temperature();
        delay.delay_ms(SETTLE_MS);

        if temperature.is_nan() || humidity.is_nan() {
            tracing::warn!("climate sensor read failed");
        }

        let soil_moisture = self
            .read_soil_raw(delay)
            .map(|raw| soil_percent(raw, self.calibration));

        Reading {
            temperature,
            humidity,
            soil_moisture,
        }
    }

    fn read_soil_raw(&mut self, delay: &mut impl DelayNs) -> Option<u16> {
        if let Err(e) = self.sensor_power.set_high() {
            tracing::warn!(error = ?e, "soil sensor power on failed");
        }
        delay.delay_ms(SETTLE_MS);
        let raw = self.sensor.read_raw();
        if let Err(e) = self.sensor_power.set_low() {
            tracing::warn!(error = ?e, "soil sensor power off failed");
        }

        match raw {
            Ok(raw) => {
                tracing::debug!(raw, "soil sensor read");
                Some(raw)
            }
            Err(e) => {
                tracing::warn!(error = ?e, "soil sensor read failed");
                None
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
