//! Serial line protocol spoken by the node.

/// Sent to the node to toggle the valve.
pub const TOGGLE_COMMAND: &str = "go";

const BANNER: &str = "--------------------";

// ---------------------------------------------------------------------------
// Message types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceLine {
    /// Start of a reading block.
    Banner,
    /// `None` when the node printed `nan` or anything else unparseable.
    Temperature(Option<f32>),
    Humidity(Option<f32>),
    Soil(Option<u8>),
    /// Valve acknowledgement text, e.g. `OPEN`, `CLOSED` or `FAULT`.
    Servo(String),
}

/// Parse one line received from the node. Unknown lines give `None`.
pub fn parse_line(line: &str) -> Option<DeviceLine> {
    let line = line.trim();
    if line == BANNER {
        return Some(DeviceLine::Banner);
    }

    let (key, rest) = line.split_once(':')?;
    let rest = rest.trim();
    match key.trim() {
        "Temp" => Some(DeviceLine::Temperature(number(rest, "C"))),
        "Humi" => Some(DeviceLine::Humidity(number(rest, "%"))),
        "Soil" => Some(DeviceLine::Soil(
            number(rest, "%").and_then(|v| (0.0..=100.0).contains(&v).then_some(v.round() as u8)),
        )),
        "Servo" if !rest.is_empty() => Some(DeviceLine::Servo(rest.to_string())),
        _ => None,
    }
}

/// Strip a trailing unit and parse a finite float.
fn number(s: &str, unit: &str) -> Option<f32> {
    let s = s.strip_suffix(unit).unwrap_or(s).trim();
    s.parse::<f32>().ok().filter(|v| v.is_finite())
}

// ===========================================================================
// Tests
// ===========================================================================
