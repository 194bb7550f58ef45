//! Hub settings: TOML file, then environment overrides, then validation.

use std::env;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use axum::http::HeaderValue;
use serde::Deserialize;

use crate::status::{Band, Thresholds};

pub const DEFAULT_CONFIG_PATH: &str = "smartpot.toml";

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub serial: SerialSettings,
    pub storage: StorageSettings,
    pub api: ApiSettings,
    pub thresholds: Thresholds,
    pub watering: WateringSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    /// Read timeout of the serial port.
    pub timeout_ms: u64,
    /// Wait between reconnect attempts.
    pub reconnect_secs: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/rfcomm0".to_string(),
            baud_rate: 9600,
            timeout_ms: 2000,
            reconnect_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Holds `sensor_data.json` and `command.txt`.
    pub data_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub host: String,
    pub port: u16,
    /// Serve canned plant data and skip the command queue.
    pub mock_mode: bool,
    /// Origins allowed to call the API from a browser. `*` allows any.
    pub cors_origins: Vec<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            mock_mode: false,
            cors_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WateringSettings {
    pub min_seconds: u64,
    pub max_seconds: u64,
    pub default_seconds: u64,
}

impl Default for WateringSettings {
    fn default() -> Self {
        Self {
            min_seconds: 1,
            max_seconds: 30,
            default_seconds: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl HubConfig {
    /// Read `CONFIG_PATH` (or `smartpot.toml`) and apply env overrides.
    pub fn from_env() -> Result<Self> {
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut cfg = load_file(&path)?;
        cfg.apply_overrides(|key| env::var(key).ok())?;
        cfg.validate()
            .with_context(|| format!("invalid config: {path}"))?;
        Ok(cfg)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SERIAL_PORT") {
            self.serial.port = v;
        }
        if let Some(v) = get("BAUD_RATE") {
            self.serial.baud_rate = parse("BAUD_RATE", &v)?;
        }
        if let Some(v) = get("DATA_DIR") {
            self.storage.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("API_HOST") {
            self.api.host = v;
        }
        if let Some(v) = get("API_PORT") {
            self.api.port = parse("API_PORT", &v)?;
        }
        if let Some(v) = get("MOCK_MODE") {
            self.api.mock_mode = v.trim().eq_ignore_ascii_case("true") || v.trim() == "1";
        }
        if let Some(v) = get("CORS_ORIGINS") {
            self.api.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }
}

/// Parse a TOML config file. A missing file yields the defaults.
pub fn load_file(path: &str) -> Result<HubConfig> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path, "no config file, using defaults");
            return Ok(HubConfig::default());
        }
        Err(e) => return Err(e).with_context(|| format!("failed to read config: {path}")),
    };
    toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))
}

fn parse<T>(key: &str, v: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    v.trim()
        .parse()
        .with_context(|| format!("invalid {key}: {v:?}"))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl HubConfig {
    /// Returns `Ok(())` or an error describing every violation found.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_serial(&mut errors);
        self.validate_api(&mut errors);
        self.validate_thresholds(&mut errors);
        self.validate_watering(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_serial(&self, errors: &mut Vec<String>) {
        let s = &self.serial;
        if s.port.trim().is_empty() {
            errors.push("serial.port is empty".to_string());
        }
        if s.baud_rate == 0 {
            errors.push("serial.baud_rate must be positive".to_string());
        }
        if s.timeout_ms == 0 {
            errors.push("serial.timeout_ms must be positive".to_string());
        }
        if s.reconnect_secs == 0 {
            errors.push("serial.reconnect_secs must be positive".to_string());
        }
        if self.storage.data_dir.as_os_str().is_empty() {
            errors.push("storage.data_dir is empty".to_string());
        }
    }

    fn validate_api(&self, errors: &mut Vec<String>) {
        if self.api.host.trim().is_empty() {
            errors.push("api.host is empty".to_string());
        }
        if self.api.port == 0 {
            errors.push("api.port must be non-zero".to_string());
        }
        for origin in &self.api.cors_origins {
            if origin != "*" && HeaderValue::from_str(origin).is_err() {
                errors.push(format!("api.cors_origins: invalid origin {origin:?}"));
            }
        }
    }

    fn validate_thresholds(&self, errors: &mut Vec<String>) {
        let air = &self.thresholds.air;
        let bands = [
            ("optimal_temperature", air.optimal_temperature),
            ("optimal_humidity", air.optimal_humidity),
            ("moderate_temperature", air.moderate_temperature),
            ("moderate_humidity", air.moderate_humidity),
        ];
        for (name, band) in bands {
            if !band.min.is_finite() || !band.max.is_finite() || band.min > band.max {
                errors.push(format!(
                    "thresholds.air.{name}: min ({}) must not exceed max ({})",
                    band.min, band.max
                ));
            }
        }
        if !encloses(air.moderate_temperature, air.optimal_temperature) {
            errors.push(
                "thresholds.air.moderate_temperature must enclose optimal_temperature".to_string(),
            );
        }
        if !encloses(air.moderate_humidity, air.optimal_humidity) {
            errors.push(
                "thresholds.air.moderate_humidity must enclose optimal_humidity".to_string(),
            );
        }

        let ground = &self.thresholds.ground;
        if !(0.0..=100.0).contains(&ground.dry_below) {
            errors.push(format!(
                "thresholds.ground.dry_below {} out of range [0, 100]",
                ground.dry_below
            ));
        }
        if let Some(m) = ground.moderate_below {
            if m <= ground.dry_below || m > 100.0 {
                errors.push(format!(
                    "thresholds.ground.moderate_below ({m}) must be in ({}, 100]",
                    ground.dry_below
                ));
            }
        }
    }

    fn validate_watering(&self, errors: &mut Vec<String>) {
        let w = &self.watering;
        if w.min_seconds == 0 {
            errors.push("watering.min_seconds must be positive".to_string());
        }
        if w.min_seconds > w.max_seconds {
            errors.push(format!(
                "watering.min_seconds ({}) must not exceed max_seconds ({})",
                w.min_seconds, w.max_seconds
            ));
        }
        if !(w.min_seconds..=w.max_seconds).contains(&w.default_seconds) {
            errors.push(format!(
                "watering.default_seconds {} outside [{}, {}]",
                w.default_seconds, w.min_seconds, w.max_seconds
            ));
        }
    }
}

fn encloses(outer: Band, inner: Band) -> bool {
    outer.min <= inner.min && inner.max <= outer.max
}

// ===========================================================================
// Tests
// ===========================================================================
