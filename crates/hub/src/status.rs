//! Numeric readings → categorical air / ground status.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AirStatus {
    Optimal,
    Moderate,
    Bad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroundStatus {
    Optimal,
    Moderate,
    Dry,
}

/// Inclusive `[min, max]` band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f32,
    pub max: f32,
}

impl Band {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, v: f32) -> bool {
        (self.min..=self.max).contains(&v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirThresholds {
    pub optimal_temperature: Band,
    pub optimal_humidity: Band,
    pub moderate_temperature: Band,
    pub moderate_humidity: Band,
}

impl Default for AirThresholds {
    fn default() -> Self {
        Self {
            optimal_temperature: Band::new(18.0, 28.0),
            optimal_humidity: Band::new(40.0, 70.0),
            moderate_temperature: Band::new(15.0, 32.0),
            moderate_humidity: Band::new(30.0, 80.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundThresholds {
    /// Soil percent below this is `dry`.
    pub dry_below: f32,
    /// When set, soil percent in `[dry_below, moderate_below)` is `moderate`.
    pub moderate_below: Option<f32>,
}

impl Default for GroundThresholds {
    fn default() -> Self {
        Self {
            dry_below: 40.0,
            moderate_below: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub air: AirThresholds,
    pub ground: GroundThresholds,
}

/// `None` when either value is missing or not finite.
pub fn classify_air(
    temperature: Option<f32>,
    humidity: Option<f32>,
    t: &AirThresholds,
) -> Option<AirStatus> {
    let temperature = temperature.filter(|v| v.is_finite())?;
    let humidity = humidity.filter(|v| v.is_finite())?;

    let status = if t.optimal_temperature.contains(temperature) && t.optimal_humidity.contains(humidity)
    {
        AirStatus::Optimal
    } else if t.moderate_temperature.contains(temperature)
        && t.moderate_humidity.contains(humidity)
    {
        AirStatus::Moderate
    } else {
        AirStatus::Bad
    };
    Some(status)
}

pub fn classify_ground(soil: Option<u8>, t: &GroundThresholds) -> Option<GroundStatus> {
    let soil = soil? as f32;

    let status = if soil < t.dry_below {
        GroundStatus::Dry
    } else if t.moderate_below.is_some_and(|limit| soil < limit) {
        GroundStatus::Moderate
    } else {
        GroundStatus::Optimal
    };
    Some(status)
}

// ===========================================================================
// Tests
// ===========================================================================
