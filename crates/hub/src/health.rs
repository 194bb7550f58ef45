//! Plant health verdict from the air and ground statuses.
//!
//! Rules are checked top to bottom and the first match wins. Several
//! combinations satisfy more than one rule, so the order is significant.
//!
//! | # | air      | ground   | verdict                 |
//! |---|----------|----------|-------------------------|
//! | 1 | missing  | missing  | unknown                 |
//! | 2 | optimal  | optimal  | ok                      |
//! | 3 | bad      | dry      | critical (combined)     |
//! | 4 | bad      | any      | critical (air)          |
//! | 5 | moderate | dry      | warning (combined)      |
//! | 6 | any      | dry      | warning (soil)          |
//! | 7 | moderate | any      | warning (air)           |
//! | 8 | anything else       | unknown                 |

use serde::Serialize;

use crate::status::{AirStatus, GroundStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Ok,
    Warning,
    Critical,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthVerdict {
    pub health: Health,
    pub title: &'static str,
    pub description: &'static str,
}

const UNKNOWN: HealthVerdict = HealthVerdict {
    health: Health::Unknown,
    title: "—",
    description: "Waiting for sensor data…",
};

const ALL_GOOD: HealthVerdict = HealthVerdict {
    health: Health::Ok,
    title: "Everything looks good",
    description: "All parameters are within the target range.",
};

const CRITICAL_COMBINED: HealthVerdict = HealthVerdict {
    health: Health::Critical,
    title: "Critical environment conditions",
    description: "Air conditions are outside safe limits and soil moisture is low. \
                  Immediate action is required to protect the plant.",
};

const CRITICAL_AIR: HealthVerdict = HealthVerdict {
    health: Health::Critical,
    title: "Air conditions are outside safe limits",
    description: "Air temperature or humidity is far outside the recommended range. \
                  Please adjust room conditions or relocate the plant.",
};

const WARNING_COMBINED: HealthVerdict = HealthVerdict {
    health: Health::Warning,
    title: "Current conditions need adjustment",
    description: "Both air conditions and soil moisture are outside the optimal range. \
                  Consider adjusting the environment and watering the plant.",
};

const WARNING_SOIL: HealthVerdict = HealthVerdict {
    health: Health::Warning,
    title: "Soil moisture is low",
    description: "Soil humidity is below the target range. Watering is recommended.",
};

const WARNING_AIR: HealthVerdict = HealthVerdict {
    health: Health::Warning,
    title: "Air conditions are slightly off",
    description: "Temperature or air humidity is outside the optimal range but still acceptable.",
};

pub fn evaluate(air: Option<AirStatus>, ground: Option<GroundStatus>) -> HealthVerdict {
    use AirStatus as A;
    use GroundStatus as G;

    let (Some(air), Some(ground)) = (air, ground) else {
        return UNKNOWN;
    };

    match (air, ground) {
        (A::Optimal, G::Optimal) => ALL_GOOD,
        (A::Bad, G::Dry) => CRITICAL_COMBINED,
        (A::Bad, _) => CRITICAL_AIR,
        (A::Moderate, G::Dry) => WARNING_COMBINED,
        (_, G::Dry) => WARNING_SOIL,
        (A::Moderate, _) => WARNING_AIR,
        // Optimal air with moderate soil has no rule of its own.
        _ => UNKNOWN,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const AIRS: [Option<AirStatus>; 4] = [
        None,
        Some(AirStatus::Optimal),
        Some(AirStatus::Moderate),
        Some(AirStatus::Bad),
    ];
    const GROUNDS: [Option<GroundStatus>; 4] = [
        None,
        Some(GroundStatus::Optimal),
        Some(GroundStatus::Moderate),
        Some(GroundStatus::Dry),
    ];

    #[test]
    fn missing_status_is_unknown() {
        for g in GROUNDS {
            assert_eq!(evaluate(None, g), UNKNOWN);
        }
        for a in AIRS {
            assert_eq!(evaluate(a, None), UNKNOWN);
        }
        assert_eq!(UNKNOWN.title, "—");
        assert_eq!(UNKNOWN.description, "Waiting for sensor data…");
    }

    #[test]
    fn optimal_pair_is_ok() {
        let v = evaluate(Some(AirStatus::Optimal), Some(GroundStatus::Optimal));
        assert_eq!(v.health, Health::Ok);
        assert_eq!(v.title, "Everything looks good");
    }

    #[test]
    fn bad_air_and_dry_soil_is_combined_critical() {
        let v = evaluate(Some(AirStatus::Bad), Some(GroundStatus::Dry));
        assert_eq!(v.health, Health::Critical);
        assert_eq!(v.title, "Critical environment conditions");
        assert_eq!(
            v.description,
            "Air conditions are outside safe limits and soil moisture is low. \
             Immediate action is required to protect the plant."
        );
    }

    #[test]
    fn bad_air_alone_is_air_critical() {
        for g in [GroundStatus::Optimal, GroundStatus::Moderate] {
            let v = evaluate(Some(AirStatus::Bad), Some(g));
            assert_eq!(v, CRITICAL_AIR);
        }
        assert_ne!(
            evaluate(Some(AirStatus::Bad), Some(GroundStatus::Optimal)),
            evaluate(Some(AirStatus::Bad), Some(GroundStatus::Dry))
        );
    }

    #[test]
    fn moderate_air_and_dry_soil_is_combined_warning() {
        let v = evaluate(Some(AirStatus::Moderate), Some(GroundStatus::Dry));
        assert_eq!(v.health, Health::Warning);
        assert_eq!(v.title, "Current conditions need adjustment");
    }

    #[test]
    fn dry_soil_with_good_air_is_soil_warning() {
        let v = evaluate(Some(AirStatus::Optimal), Some(GroundStatus::Dry));
        assert_eq!(v.health, Health::Warning);
        assert_eq!(v.title, "Soil moisture is low");
        assert_eq!(
            v.description,
            "Soil humidity is below the target range. Watering is recommended."
        );
    }

    #[test]
    fn moderate_air_with_wet_soil_is_air_warning() {
        let v = evaluate(Some(AirStatus::Moderate), Some(GroundStatus::Optimal));
        assert_eq!(v.health, Health::Warning);
        assert_eq!(v.title, "Air conditions are slightly off");
        assert_eq!(
            evaluate(Some(AirStatus::Moderate), Some(GroundStatus::Moderate)),
            WARNING_AIR
        );
    }

    #[test]
    fn the_three_warnings_are_distinct() {
        let combined = evaluate(Some(AirStatus::Moderate), Some(GroundStatus::Dry));
        let soil = evaluate(Some(AirStatus::Optimal), Some(GroundStatus::Dry));
        let air = evaluate(Some(AirStatus::Moderate), Some(GroundStatus::Optimal));
        assert_ne!(combined, soil);
        assert_ne!(combined, air);
        assert_ne!(soil, air);
    }

    #[test]
    fn optimal_air_with_moderate_soil_falls_through_to_unknown() {
        assert_eq!(
            evaluate(Some(AirStatus::Optimal), Some(GroundStatus::Moderate)),
            UNKNOWN
        );
    }

    #[test]
    fn evaluate_is_deterministic_over_every_pair() {
        for a in AIRS {
            for g in GROUNDS {
                assert_eq!(evaluate(a, g), evaluate(a, g), "air={a:?} ground={g:?}");
            }
        }
    }

    #[test]
    fn verdict_serializes_for_the_api() {
        let v = serde_json::to_value(evaluate(None, None)).unwrap();
        assert_eq!(v["health"], "unknown");
        assert_eq!(v["title"], "—");
    }
}
