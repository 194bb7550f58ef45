//! Serial bridge: node lines → snapshot file, command queue → node.

use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::config::HubConfig;
use crate::protocol::parse_line;
use crate::queue::CommandQueue;
use crate::snapshot::{DaemonStatus, Snapshot, SnapshotStore};

/// How often the command queue is polled while connected.
pub const QUEUE_POLL: Duration = Duration::from_millis(100);

const LINE_CHANNEL_DEPTH: usize = 64;

/// Why a connected session ended.
#[derive(Debug)]
enum SessionEnd {
    /// The port could not be opened, read or written.
    Link(anyhow::Error),
    /// Anything else, e.g. the data directory became unwritable.
    Fault(anyhow::Error),
}

pub struct Daemon {
    cfg: HubConfig,
    store: SnapshotStore,
    queue: CommandQueue,
    snapshot: Snapshot,
}

impl Daemon {
    pub fn new(cfg: HubConfig) -> Self {
        let store = SnapshotStore::new(&cfg.storage.data_dir);
        let queue = CommandQueue::new(&cfg.storage.data_dir);
        Self {
            cfg,
            store,
            queue,
            snapshot: Snapshot::default(),
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Run until Ctrl-C, reconnecting after every serial failure.
    pub async fn run(mut self) -> Result<()> {
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        let reconnect = Duration::from_secs(self.cfg.serial.reconnect_secs);
        self.set_status(DaemonStatus::Starting);

        loop {
            let end = tokio::select! {
                res = &mut shutdown => {
                    res.context("failed to listen for ctrl-c")?;
                    break;
                }
                end = self.session() => end,
            };

            let status = match end {
                SessionEnd::Link(e) => {
                    tracing::error!("serial error: {e:#}");
                    DaemonStatus::Disconnected
                }
                SessionEnd::Fault(e) => {
                    tracing::error!("unexpected error: {e:#}");
                    DaemonStatus::Error
                }
            };
            self.set_status(status);
            tracing::info!(secs = reconnect.as_secs(), "retrying serial connection");

            tokio::select! {
                res = &mut shutdown => {
                    res.context("failed to listen for ctrl-c")?;
                    break;
                }
                _ = sleep(reconnect) => {}
            }
        }

        tracing::info!("shutting down");
        self.set_status(DaemonStatus::Stopped);
        Ok(())
    }

    /// One connection lifetime. Only returns when the session is over.
    async fn session(&mut self) -> SessionEnd {
        let serial = &self.cfg.serial;
        tracing::info!(port = %serial.port, baud = serial.baud_rate, "connecting");

        let mut port = match serialport::new(&serial.port, serial.baud_rate)
            .timeout(Duration::from_millis(serial.timeout_ms))
            .open()
            .with_context(|| format!("failed to open {}", serial.port))
        {
            Ok(p) => p,
            Err(e) => return SessionEnd::Link(e),
        };
        let reader = match port.try_clone().context("failed to clone serial handle") {
            Ok(r) => r,
            Err(e) => return SessionEnd::Link(e),
        };

        let (tx, mut rx) = mpsc::channel(LINE_CHANNEL_DEPTH);
        std::thread::spawn(move || read_lines(BufReader::new(reader), tx));

        tracing::info!("connected");
        if let Err(e) = self.persist_status(DaemonStatus::Connected) {
            return SessionEnd::Fault(e);
        }

        let mut ticker = interval(QUEUE_POLL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                line = rx.recv() => match line {
                    Some(Ok(line)) => {
                        if let Err(e) = self.handle_line(&line, OffsetDateTime::now_utc()) {
                            return SessionEnd::Fault(e);
                        }
                    }
                    Some(Err(e)) => return SessionEnd::Link(anyhow::Error::new(e).context("serial read failed")),
                    None => return SessionEnd::Link(anyhow::anyhow!("serial reader stopped")),
                },
                _ = ticker.tick() => {
                    let commands = match self.queue.drain() {
                        Ok(c) => c,
                        Err(e) => return SessionEnd::Fault(e),
                    };
                    if let Err(e) = send_commands(&mut port, &commands) {
                        return SessionEnd::Link(e);
                    }
                }
            }
        }
    }

    /// Parse one received line, update the snapshot, and persist it.
    pub fn handle_line(&mut self, line: &str, now: OffsetDateTime) -> Result<()> {
        tracing::debug!(rx = line);
        let Some(parsed) = parse_line(line) else {
            return Ok(());
        };
        if self.snapshot.apply(parsed, now, &self.cfg.thresholds) {
            self.store.save(&self.snapshot)?;
        }
        Ok(())
    }

    fn persist_status(&mut self, status: DaemonStatus) -> Result<()> {
        self.snapshot.daemon_status = status;
        self.store.save(&self.snapshot)
    }

    /// Best-effort status update used on the way out of a session.
    fn set_status(&mut self, status: DaemonStatus) {
        if let Err(e) = self.persist_status(status) {
            tracing::warn!("failed to save daemon status: {e:#}");
        }
    }
}

/// Write each command as its own line.
pub fn send_commands<W: Write + ?Sized>(port: &mut W, commands: &[String]) -> Result<()> {
    if commands.is_empty() {
        return Ok(());
    }
    for cmd in commands {
        tracing::info!(cmd = %cmd, "sending command");
        port.write_all(format!("{cmd}\n").as_bytes())
            .context("serial write failed")?;
    }
    port.flush().context("serial flush failed")
}

/// Blocking reader loop: forwards complete, non-empty lines until the port
/// fails or the receiver goes away. Read timeouts are not errors.
pub fn read_lines<R: BufRead>(mut reader: R, tx: mpsc::Sender<io::Result<String>>) {
    let mut buf = Vec::new();
    loop {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                if !buf.is_empty() {
                    let _ = tx.blocking_send(Ok(decode(&buf)));
                }
                let _ = tx.blocking_send(Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "serial port closed",
                )));
                return;
            }
            Ok(_) => {
                if buf.last() != Some(&b'\n') {
                    continue;
                }
                let line = decode(&buf);
                buf.clear();
                if line.is_empty() {
                    continue;
                }
                if tx.blocking_send(Ok(line)).is_err() {
                    return;
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                if tx.is_closed() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                return;
            }
        }
    }
}

fn decode(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim().to_string()
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{AirStatus, GroundStatus};
    use std::io::Cursor;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-05-01 08:30 UTC);

    fn daemon(dir: &tempfile::TempDir) -> Daemon {
        let mut cfg = HubConfig::default();
        cfg.storage.data_dir = dir.path().to_path_buf();
        Daemon::new(cfg)
    }

    fn collect(input: &[u8]) -> Vec<io::Result<String>> {
        let (tx, mut rx) = mpsc::channel(16);
        read_lines(Cursor::new(input.to_vec()), tx);
        let mut out = Vec::new();
        while let Some(item) = rx.blocking_recv() {
            out.push(item);
        }
        out
    }

    // -- handle_line ---------------------------------------------------------

    #[test]
    fn reading_block_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = daemon(&dir);
        for line in [
            "--------------------",
            "Temp: 21.20 C",
            "Humi: 45.00 %",
            "Soil: 22 %",
        ] {
            d.handle_line(line, NOW).unwrap();
        }

        let saved = SnapshotStore::new(dir.path()).load().unwrap().unwrap();
        assert_eq!(saved.temperature, Some(21.2));
        assert_eq!(saved.soil_humidity, Some(22));
        assert_eq!(saved.air_status, Some(AirStatus::Optimal));
        assert_eq!(saved.ground_status, Some(GroundStatus::Dry));
        assert_eq!(saved.last_updated, Some(NOW));
        assert_eq!(&saved, d.snapshot());
    }

    #[test]
    fn noise_lines_do_not_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = daemon(&dir);
        d.handle_line("booting", NOW).unwrap();
        d.handle_line("--------------------", NOW).unwrap();
        assert!(SnapshotStore::new(dir.path()).load().unwrap().is_none());
    }

    #[test]
    fn servo_ack_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = daemon(&dir);
        d.handle_line("Servo: OPEN", NOW).unwrap();
        let saved = SnapshotStore::new(dir.path()).load().unwrap().unwrap();
        assert_eq!(saved.last_servo_action.as_deref(), Some("OPEN"));
    }

    #[test]
    fn status_changes_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = daemon(&dir);
        d.set_status(DaemonStatus::Disconnected);
        let saved = SnapshotStore::new(dir.path()).load().unwrap().unwrap();
        assert_eq!(saved.daemon_status, DaemonStatus::Disconnected);
    }

    // -- send_commands -------------------------------------------------------

    #[test]
    fn commands_written_one_per_line() {
        let mut out: Vec<u8> = Vec::new();
        send_commands(&mut out, &["go".to_string(), "go".to_string()]).unwrap();
        assert_eq!(out, b"go\ngo\n");
    }

    #[test]
    fn queued_commands_reach_the_port() {
        let dir = tempfile::tempdir().unwrap();
        let d = daemon(&dir);
        d.queue.push("go").unwrap();
        let mut out: Vec<u8> = Vec::new();
        send_commands(&mut out, &d.queue.drain().unwrap()).unwrap();
        assert_eq!(out, b"go\n");
    }

    // -- read_lines ----------------------------------------------------------

    #[test]
    fn reader_splits_lines_and_reports_eof() {
        let out = collect(b"Temp: 20.00 C\r\n\r\nSoil: 5 %\n");
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].as_ref().unwrap(), "Temp: 20.00 C");
        assert_eq!(out[1].as_ref().unwrap(), "Soil: 5 %");
        assert_eq!(out[2].as_ref().unwrap_err().kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn reader_flushes_partial_line_at_eof() {
        let out = collect(b"Servo: CLOSED");
        assert_eq!(out[0].as_ref().unwrap(), "Servo: CLOSED");
        assert!(out[1].is_err());
    }

    #[test]
    fn reader_tolerates_invalid_utf8() {
        let out = collect(b"\xffHumi: 40.00 %\n");
        assert!(out[0].as_ref().unwrap().ends_with("Humi: 40.00 %"));
    }

    #[test]
    fn reader_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        // Returns instead of blocking forever.
        read_lines(Cursor::new(b"a\nb\nc\n".to_vec()), tx);
    }
}
