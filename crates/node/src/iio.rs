//! DHT11/DHT22 readings through the Linux IIO subsystem.
//!
//! With `dtoverlay=dht11,gpiopin=N` the kernel exposes the sensor as
//! `/sys/bus/iio/devices/iio:deviceX/` with `in_temp_input` (milli-°C) and
//! `in_humidityrelative_input` (milli-%). The driver often returns EIO on a
//! bad checksum; that maps to `NaN`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::hal::ClimateSensor;

pub const DEFAULT_DIR: &str = "/sys/bus/iio/devices/iio:device0";

pub struct IioClimate {
    dir: PathBuf,
}

impl IioClimate {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read_milli(&self, file: &str) -> f32 {
        read_milli(&self.dir.join(file))
    }
}

fn read_milli(path: &Path) -> f32 {
    match fs::read_to_string(path) {
        Ok(s) => match s.trim().parse::<i64>() {
            Ok(v) => v as f32 / 1000.0,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "unparseable iio value");
                f32::NAN
            }
        },
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "iio read failed");
            f32::NAN
        }
    }
}

impl ClimateSensor for IioClimate {
    fn read_humidity(&mut self) -> f32 {
        self.read_milli("in_humidityrelative_input")
    }

    fn read_temperature(&mut self) -> f32 {
        self.read_milli("in_temp_input")
    }
}
