//! Cooperative control loop.
//!
//! Every [`Controller::step`] runs two phases in order:
//!
//! ```text
//! Commands ──▶ drain all waiting input bytes, toggle on each `go`
//!    │
//!    ▼
//! Sampling ──▶ if interval elapsed: sample, print block, restart timer
//! ```
//!
//! Everything runs on the caller's thread. A toggle or a sample blocks the
//! loop until its settle delays are done; nothing overlaps.

use crate::command::{Command, CommandListener};
use crate::hal::{AnalogInput, ClimateSensor, Clock, DelayNs, Link, OutputPin, Servo};
use crate::sampler::{Reading, Sampler};
use crate::valve::{Valve, ValveError, ValveState};

/// Default time between readings.
pub const SAMPLE_INTERVAL_MS: u64 = 10_000;

/// Acknowledgement written when the servo rejected a move.
pub const FAULT_ACK: &str = "Servo: FAULT";

/// Outcome of one [`Controller::step`].
#[derive(Debug, Default, PartialEq)]
pub struct Tick {
    /// Results of the toggles triggered during the command phase.
    pub toggles: Vec<Option<ValveState>>,
    /// The reading taken during the sampling phase, if one was due.
    pub reading: Option<Reading>,
}

pub struct Controller<L, S, C, A, P, D, K> {
    link: L,
    listener: CommandListener,
    valve: Valve<S>,
    sampler: Sampler<C, A, P>,
    delay: D,
    clock: K,
    interval_ms: u64,
    last_sample_ms: u64,
}

impl<L, S, C, A, P, D, K> Controller<L, S, C, A, P, D, K>
where
    L: Link,
    S: Servo,
    C: ClimateSensor,
    A: AnalogInput,
    P: OutputPin,
    D: DelayNs,
    K: Clock,
{
    pub fn new(
        link: L,
        valve: Valve<S>,
        sampler: Sampler<C, A, P>,
        delay: D,
        clock: K,
        interval_ms: u64,
    ) -> Self {
        let last_sample_ms = clock.now_ms();
        Self {
            link,
            listener: CommandListener::new(),
            valve,
            sampler,
            delay,
            clock,
            interval_ms,
            last_sample_ms,
        }
    }

    /// Bring the servo to the closed position at boot.
    pub fn park(&mut self) -> Result<(), ValveError<S::Error>> {
        self.valve.park(&mut self.delay)
    }

    pub fn valve_state(&self) -> ValveState {
        self.valve.state()
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Run one loop iteration: commands first, then sampling.
    pub fn step(&mut self) -> Tick {
        let toggles = self.drain_commands();
        let reading = self.sample_if_due();
        Tick { toggles, reading }
    }

    /// Take and print a reading now, restarting the interval timer.
    pub fn sample_now(&mut self) -> Reading {
        let reading = self.sampler.sample(&mut self.delay);
        for line in reading.lines() {
            self.link.write_line(&line);
        }
        self.last_sample_ms = self.clock.now_ms();

        tracing::info!(
            temperature = reading.temperature,
            humidity = reading.humidity,
            soil = ?reading.soil_moisture,
            "reading sent"
        );
        reading
    }

    fn drain_commands(&mut self) -> Vec<Option<ValveState>> {
        let mut toggles = Vec::new();
        while let Some(byte) = self.link.read_byte() {
            if let Some(Command::ToggleValve) = self.listener.push(byte) {
                toggles.push(self.toggle_valve());
            }
        }
        toggles
    }

    fn toggle_valve(&mut self) -> Option<ValveState> {
        let result = self.valve.toggle(&mut self.delay);
        self.last_sample_ms = self.clock.now_ms();

        match result {
            Ok(state) => {
                self.link.write_line(&format!("Servo: {state}"));
                Some(state)
            }
            Err(e) => {
                tracing::error!("{e}");
                self.link.write_line(FAULT_ACK);
                None
            }
        }
    }

    fn sample_if_due(&mut self) -> Option<Reading> {
        let elapsed = self.clock.now_ms().saturating_sub(self.last_sample_ms);
        if elapsed >= self.interval_ms {
            Some(self.sample_now())
        } else {
            None
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
