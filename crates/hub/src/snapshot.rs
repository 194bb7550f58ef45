//! Latest plant state, shared between the daemon and the API through a
//! JSON file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::protocol::DeviceLine;
use crate::status::{classify_air, classify_ground, AirStatus, GroundStatus, Thresholds};

pub const SNAPSHOT_FILE: &str = "sensor_data.json";

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonStatus {
    #[default]
    Starting,
    Connected,
    Disconnected,
    Stopped,
    Error,
}

impl DaemonStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub temperature: Option<f32>,
    pub air_humidity: Option<f32>,
    pub soil_humidity: Option<u8>,
    pub air_status: Option<AirStatus>,
    pub ground_status: Option<GroundStatus>,
    pub last_servo_action: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_servo_time: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_updated: Option<OffsetDateTime>,
    pub daemon_status: DaemonStatus,
}

impl Snapshot {
    /// Fold one parsed device line into the snapshot. Returns `true` when
    /// something changed and the snapshot should be persisted.
    pub fn apply(&mut self, line: DeviceLine, now: OffsetDateTime, thresholds: &Thresholds) -> bool {
        match line {
            DeviceLine::Banner => return false,
            DeviceLine::Temperature(v) => self.temperature = v,
            DeviceLine::Humidity(v) => self.air_humidity = v,
            DeviceLine::Soil(v) => self.soil_humidity = v,
            DeviceLine::Servo(action) => {
                self.last_servo_action = Some(action);
                self.last_servo_time = Some(now);
                return true;
            }
        }

        self.air_status = classify_air(self.temperature, self.air_humidity, &thresholds.air);
        self.ground_status = classify_ground(self.soil_humidity, &thresholds.ground);
        self.last_updated = Some(now);
        true
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(SNAPSHOT_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        let snapshot = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(Some(snapshot))
    }

    /// Write to a sibling temp file, then rename it over the target so a
    /// reader never observes a partial document.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(snapshot).context("failed to encode snapshot")?;
        {
            let mut f = fs::File::create(&tmp)
                .with_context(|| format!("failed to create {}", tmp.display()))?;
            f.write_all(&json)
                .and_then(|_| f.sync_all())
                .with_context(|| format!("failed to write {}", tmp.display()))?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-05-01 12:00 UTC);

    fn fill(s: &mut Snapshot, t: f32, h: f32, soil: u8) {
        let th = Thresholds::default();
        s.apply(DeviceLine::Temperature(Some(t)), NOW, &th);
        s.apply(DeviceLine::Humidity(Some(h)), NOW, &th);
        s.apply(DeviceLine::Soil(Some(soil)), NOW, &th);
    }

    // -- apply ---------------------------------------------------------------

    #[test]
    fn reading_block_sets_values_and_statuses() {
        let mut s = Snapshot::default();
        fill(&mut s, 21.2, 45.0, 73);
        assert_eq!(s.temperature, Some(21.2));
        assert_eq!(s.air_humidity, Some(45.0));
        assert_eq!(s.soil_humidity, Some(73));
        assert_eq!(s.air_status, Some(AirStatus::Optimal));
        assert_eq!(s.ground_status, Some(GroundStatus::Optimal));
        assert_eq!(s.last_updated, Some(NOW));
    }

    #[test]
    fn nan_clears_value_and_status() {
        let mut s = Snapshot::default();
        fill(&mut s, 21.2, 45.0, 20);
        assert_eq!(s.ground_status, Some(GroundStatus::Dry));

        s.apply(DeviceLine::Temperature(None), NOW, &Thresholds::default());
        assert_eq!(s.temperature, None);
        assert_eq!(s.air_status, None);

        s.apply(DeviceLine::Soil(None), NOW, &Thresholds::default());
        assert_eq!(s.ground_status, None);
    }

    #[test]
    fn servo_ack_records_action_only() {
        let mut s = Snapshot::default();
        let changed = s.apply(
            DeviceLine::Servo("OPEN".to_string()),
            NOW,
            &Thresholds::default(),
        );
        assert!(changed);
        assert_eq!(s.last_servo_action.as_deref(), Some("OPEN"));
        assert_eq!(s.last_servo_time, Some(NOW));
        assert_eq!(s.last_updated, None);
    }

    #[test]
    fn banner_changes_nothing() {
        let mut s = Snapshot::default();
        assert!(!s.apply(DeviceLine::Banner, NOW, &Thresholds::default()));
        assert_eq!(s, Snapshot::default());
    }

    #[test]
    fn serializes_with_null_fields_and_rfc3339_times() {
        let mut s = Snapshot::default();
        s.apply(DeviceLine::Soil(Some(50)), NOW, &Thresholds::default());
        let v = serde_json::to_value(&s).unwrap();
        assert!(v["temperature"].is_null());
        assert!(v["air_status"].is_null());
        assert_eq!(v["ground_status"], "optimal");
        assert_eq!(v["daemon_status"], "starting");
        assert_eq!(v["last_updated"], "2026-05-01T12:00:00Z");
    }

    // -- store ---------------------------------------------------------------

    #[test]
    fn load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let mut s = Snapshot::default();
        fill(&mut s, 30.0, 55.0, 10);
        s.daemon_status = DaemonStatus::Connected;

        store.save(&s).unwrap();
        assert_eq!(store.load().unwrap(), Some(s));
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.save(&Snapshot::default()).unwrap();
        store.save(&Snapshot::default()).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![SNAPSHOT_FILE.to_string()]);
    }

    #[test]
    fn save_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested/data"));
        store.save(&Snapshot::default()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        fs::write(store.path(), "{ not json").unwrap();
        let err = store.load().unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse"));
    }
}
