//! Servo-driven valve. The only transition is `toggle()`; there is no way
//! to set a position directly.

use std::fmt;

use crate::hal::{DelayNs, Servo};

/// Time the servo supply needs to recover after a move. Skipping it browns
/// out the board on the next operation.
pub const SETTLE_MS: u32 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveState {
    Open,
    Closed,
}

impl ValveState {
    pub fn toggled(self) -> Self {
        match self {
            Self::Open => Self::Closed,
            Self::Closed => Self::Open,
        }
    }

    /// Label used in the `Servo: <label>` acknowledgement line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ValveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Servo angles for the two valve positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoAngles {
    pub open: u8,
    pub closed: u8,
}

impl Default for ServoAngles {
    fn default() -> Self {
        Self {
            open: 90,
            closed: 0,
        }
    }
}

/// The servo rejected a move. The valve keeps its previous state.
#[derive(Debug)]
pub struct ValveError<E> {
    pub target: ValveState,
    pub source: E,
}

impl<E: fmt::Debug> fmt::Display for ValveError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "servo failed to move valve {}: {:?}", self.target, self.source)
    }
}

impl<E: fmt::Debug> std::error::Error for ValveError<E> {}

pub struct Valve<S> {
    servo: S,
    angles: ServoAngles,
    state: ValveState,
}

impl<S: Servo> Valve<S> {
    /// Starts out `Closed`. Call [`Valve::park`] once at boot to bring the
    /// servo in line with that state.
    pub fn new(servo: S, angles: ServoAngles) -> Self {
        Self {
            servo,
            angles,
            state: ValveState::Closed,
        }
    }

    pub fn state(&self) -> ValveState {
        self.state
    }

    /// Drive the servo to the angle of the current state, then settle.
    pub fn park(&mut self, delay: &mut impl DelayNs) -> Result<(), ValveError<S::Error>> {
        let target = self.state;
        let result = self.servo.write_angle(self.angle_for(target));
        delay.delay_ms(SETTLE_MS);
        result.map_err(|source| ValveError { target, source })
    }

    /// Flip the valve. Always waits [`SETTLE_MS`] after commanding the move,
    /// even when the servo reported an error.
    pub fn toggle(&mut self, delay: &mut impl DelayNs) -> Result<ValveState, ValveError<S::Error>> {
        let target = self.state.toggled();
        let result = self.servo.write_angle(self.angle_for(target));
        delay.delay_ms(SETTLE_MS);

        match result {
            Ok(()) => {
                self.state = target;
                tracing::info!(state = %target, "valve toggled");
                Ok(target)
            }
            Err(source) => {
                tracing::error!(to = %target, error = ?source, "valve toggle failed");
                Err(ValveError { target, source })
            }
        }
    }

    fn angle_for(&self, state: ValveState) -> u8 {
        match state {
            ValveState::Open => self.angles.open,
            ValveState::Closed => self.angles.closed,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
