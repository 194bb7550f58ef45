//! Simulated plant for running the node without hardware.
//!
//! Models a pot on a windowsill:
//! - Soil moisture drifts toward dry (evaporation) as a random walk with
//!   mean reversion, and rises while the valve is open
//! - Air temperature and humidity follow a slow diurnal cycle plus noise
//! - Per-read ADC noise and occasional spikes
//! - Occasional climate-sensor dropouts (`NaN`), as DHT sensors do
//! - The sensor only reads while its power pin is high

use std::cell::RefCell;
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

use crate::hal::{AnalogInput, ClimateSensor, OutputPin, Servo};
use crate::sampler::Calibration;

// ---------------------------------------------------------------------------
// Gaussian approximation (no extra dependency)
// ---------------------------------------------------------------------------

/// Approximate a sample from N(0,1) using the Irwin-Hall method:
/// sum of 12 uniform [0,1) values minus 6.
fn approx_std_normal() -> f64 {
    let mut sum: f64 = 0.0;
    for _ in 0..12 {
        sum += fastrand::f64();
    }
    sum - 6.0
}

fn gaussian(mean: f64, sigma: f64) -> f64 {
    mean + sigma * approx_std_normal()
}

// ---------------------------------------------------------------------------
// Scenario presets
// ---------------------------------------------------------------------------

/// Simulation profiles selectable via `SIM_SCENARIO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Starts mid-range and dries out steadily. Warm room.
    Drying,
    /// Hovers near the centre with low noise. Comfortable room.
    Stable,
    /// Noisy ADC, frequent spikes and climate dropouts.
    Flaky,
    /// Starts near the wet end, dries very slowly. Cool, humid room.
    Wet,
}

impl Scenario {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "stable" => Self::Stable,
            "flaky" => Self::Flaky,
            "wet" => Self::Wet,
            _ => Self::Drying,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drying => write!(f, "drying"),
            Self::Stable => write!(f, "stable"),
            Self::Flaky => write!(f, "flaky"),
            Self::Wet => write!(f, "wet"),
        }
    }
}

struct Profile {
    drift: f64,
    walk_sigma: f64,
    mean_reversion: f64,
    noise_sigma: f64,
    spike_prob: f32,
    spike_sigma: f64,
    /// 0.0 = at raw_wet, 1.0 = at raw_dry.
    start_frac: f64,
    dropout_prob: f32,
    base_temperature: f64,
    base_humidity: f64,
}

impl Profile {
    fn for_scenario(scenario: Scenario) -> Self {
        match scenario {
            Scenario::Drying => Self {
                drift: 2.0,
                walk_sigma: 3.0,
                mean_reversion: 0.01,
                noise_sigma: 4.0,
                spike_prob: 0.02,
                spike_sigma: 60.0,
                start_frac: 0.5,
                dropout_prob: 0.01,
                base_temperature: 26.0,
                base_humidity: 42.0,
            },
            Scenario::Stable => Self {
                drift: 0.2,
                walk_sigma: 1.0,
                mean_reversion: 0.05,
                noise_sigma: 2.0,
                spike_prob: 0.005,
                spike_sigma: 30.0,
                start_frac: 0.35,
                dropout_prob: 0.0,
                base_temperature: 22.0,
                base_humidity: 55.0,
            },
            Scenario::Flaky => Self {
                drift: 1.5,
                walk_sigma: 6.0,
                mean_reversion: 0.02,
                noise_sigma: 12.0,
                spike_prob: 0.10,
                spike_sigma: 150.0,
                start_frac: 0.5,
                dropout_prob: 0.15,
                base_temperature: 24.0,
                base_humidity: 50.0,
            },
            Scenario::Wet => Self {
                drift: 0.3,
                walk_sigma: 2.0,
                mean_reversion: 0.02,
                noise_sigma: 3.0,
                spike_prob: 0.01,
                spike_sigma: 40.0,
                start_frac: 0.1,
                dropout_prob: 0.0,
                base_temperature: 17.0,
                base_humidity: 75.0,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Plant model
// ---------------------------------------------------------------------------

/// Shared state behind the simulated peripherals.
pub struct PlantModel {
    profile: Profile,
    raw_dry: f64,
    raw_wet: f64,
    center: f64,
    /// Current "true" soil value in ADC units.
    soil: f64,
    watering: bool,
    /// ADC units per read while the valve is open (signed toward raw_wet).
    wet_rate: f64,
    sensor_powered: bool,
    diurnal_period_s: f64,
    started: std::time::Instant,
}

impl PlantModel {
    /// `diurnal_period_s` is the day/night cycle length: 600 for quick
    /// iteration, 86400 for real time.
    pub fn new(scenario: Scenario, calibration: Calibration, diurnal_period_s: f64) -> Self {
        let profile = Profile::for_scenario(scenario);
        let raw_dry = calibration.raw_dry as f64;
        let raw_wet = calibration.raw_wet as f64;
        let start = raw_wet + profile.start_frac * (raw_dry - raw_wet);

        Self {
            profile,
            raw_dry,
            raw_wet,
            center: (raw_dry + raw_wet) / 2.0,
            soil: start,
            watering: false,
            wet_rate: (raw_wet - raw_dry) * 0.05,
            sensor_powered: false,
            diurnal_period_s,
            started: std::time::Instant::now(),
        }
    }

    /// Wrap in the shared handle the peripherals hold.
    pub fn shared(self) -> SharedPlant {
        Rc::new(RefCell::new(self))
    }

    pub fn is_watering(&self) -> bool {
        self.watering
    }

    fn diurnal(&self) -> f64 {
        let t = self.started.elapsed().as_secs_f64();
        (2.0 * std::f64::consts::PI * t / self.diurnal_period_s).sin()
    }

    fn dropout(&self) -> bool {
        fastrand::f32() < self.profile.dropout_prob
    }

    fn next_soil_raw(&mut self) -> u16 {
        let p = &self.profile;
        let (lo, hi) = if self.raw_dry > self.raw_wet {
            (self.raw_wet, self.raw_dry)
        } else {
            (self.raw_dry, self.raw_wet)
        };
        let toward_dry = (self.raw_dry - self.raw_wet).signum();

        let pull = p.mean_reversion * (self.center - self.soil);
        let walk = gaussian(0.0, p.walk_sigma);
        let drift = toward_dry * p.drift;
        let wet = if self.watering { self.wet_rate } else { 0.0 };
        let margin = (hi - lo) * 0.05;
        self.soil = (self.soil + drift + pull + walk + wet).clamp(lo - margin, hi + margin);

        let noise = gaussian(0.0, p.noise_sigma);
        let spike = if fastrand::f32() < p.spike_prob {
            gaussian(0.0, p.spike_sigma)
        } else {
            0.0
        };

        (self.soil + noise + spike).round().clamp(0.0, u16::MAX as f64) as u16
    }
}

pub type SharedPlant = Rc<RefCell<PlantModel>>;

// ---------------------------------------------------------------------------
// Peripherals
// ---------------------------------------------------------------------------

/// Servo whose open angle starts the simulated water flow.
pub struct SimServo {
    plant: SharedPlant,
    open_angle: u8,
}

impl SimServo {
    pub fn new(plant: SharedPlant, open_angle: u8) -> Self {
        Self { plant, open_angle }
    }
}

impl Servo for SimServo {
    type Error = Infallible;

    fn write_angle(&mut self, degrees: u8) -> Result<(), Infallible> {
        let watering = degrees == self.open_angle;
        self.plant.borrow_mut().watering = watering;
        tracing::debug!(degrees, watering, "sim servo moved");
        Ok(())
    }
}

pub struct SimClimate {
    plant: SharedPlant,
}

impl SimClimate {
    pub fn new(plant: SharedPlant) -> Self {
        Self { plant }
    }
}

impl ClimateSensor for SimClimate {
    fn read_humidity(&mut self) -> f32 {
        let plant = self.plant.borrow();
        if plant.dropout() {
            return f32::NAN;
        }
        // Humidity peaks at night, opposite to temperature.
        let h = plant.profile.base_humidity - 8.0 * plant.diurnal() + gaussian(0.0, 1.0);
        h.clamp(0.0, 100.0) as f32
    }

    fn read_temperature(&mut self) -> f32 {
        let plant = self.plant.borrow();
        if plant.dropout() {
            return f32::NAN;
        }
        (plant.profile.base_temperature + 3.0 * plant.diurnal() + gaussian(0.0, 0.2)) as f32
    }
}

/// Soil sensor ADC. Reads float near zero when the sensor is unpowered.
pub struct SimSoilSensor {
    plant: SharedPlant,
}

impl SimSoilSensor {
    pub fn new(plant: SharedPlant) -> Self {
        Self { plant }
    }
}

impl AnalogInput for SimSoilSensor {
    type Error = Infallible;

    fn read_raw(&mut self) -> Result<u16, Infallible> {
        let mut plant = self.plant.borrow_mut();
        if !plant.sensor_powered {
            tracing::warn!("sim soil sensor read while unpowered");
            return Ok(fastrand::u16(0..8));
        }
        Ok(plant.next_soil_raw())
    }
}

/// Sensor supply pin.
pub struct SimSensorPower {
    plant: SharedPlant,
}

impl SimSensorPower {
    pub fn new(plant: SharedPlant) -> Self {
        Self { plant }
    }
}

impl embedded_hal::digital::ErrorType for SimSensorPower {
    type Error = Infallible;
}

impl OutputPin for SimSensorPower {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.plant.borrow_mut().sensor_powered = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.plant.borrow_mut().sensor_powered = true;
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
