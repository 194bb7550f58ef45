//! Serial link to the hub, backed by the `serialport` crate.

use std::io::{Read, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use serialport::SerialPort;

use crate::hal::Link;

/// Read timeout for the port. Reads only happen when bytes are already
/// waiting, so this bounds a stuck driver rather than normal latency.
const READ_TIMEOUT: Duration = Duration::from_millis(10);

pub struct SerialLink {
    port: Box<dyn SerialPort>,
    rx: Vec<u8>,
    pos: usize,
}

impl SerialLink {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .with_context(|| format!("failed to open serial port {path} at {baud_rate} baud"))?;

        tracing::info!(port = %path, baud_rate, "serial link open");

        Ok(Self::new(port))
    }

    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            rx: Vec::new(),
            pos: 0,
        }
    }

    fn fill(&mut self) {
        let waiting = match self.port.bytes_to_read() {
            Ok(0) => return,
            Ok(n) => n as usize,
            Err(e) => {
                tracing::warn!(error = %e, "serial bytes_to_read failed");
                return;
            }
        };

        self.rx.resize(waiting, 0);
        self.pos = 0;
        match self.port.read(&mut self.rx) {
            Ok(n) => self.rx.truncate(n),
            Err(e) => {
                tracing::warn!(error = %e, "serial read failed");
                self.rx.clear();
            }
        }
    }
}

impl Link for SerialLink {
    fn read_byte(&mut self) -> Option<u8> {
        if self.pos >= self.rx.len() {
            self.fill();
        }
        let byte = self.rx.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    fn write_line(&mut self, line: &str) {
        let result = self
            .port
            .write_all(line.as_bytes())
            .and_then(|()| self.port.write_all(b"\r\n"))
            .and_then(|()| self.port.flush());
        if let Err(e) = result {
            tracing::warn!(error = %e, line, "serial write failed");
        }
    }
}
