//! Change ledger: which source files were indexed, and at what mtime.
//!
//! The ledger only ever moves forward after a batch is safely in the vector
//! store, so a crash or failure costs reprocessing, never a skipped file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("failed to write ledger {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Path → seconds-since-epoch of the last indexed modification.
pub type PendingUpdates = BTreeMap<String, f64>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: BTreeMap<String, f64>,
}

impl Ledger {
    /// Reads the ledger at `path`. A missing, unreadable or malformed file
    /// yields an empty ledger, which means everything is reprocessed.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No ledger at {}; starting fresh", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Could not read ledger {}: {e}; starting fresh", path.display());
                return Self::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!("Ledger {} is malformed ({e}); starting fresh", path.display());
                Self::default()
            }
        }
    }

    /// Rewrites the whole ledger at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be serialized or written. The
    /// previous file is left untouched in that case.
    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        let mut bytes = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut bytes, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut serializer)?;

        let io_err = |source: std::io::Error| LedgerError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        fs::write(&tmp, &bytes).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(|e| {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                error!("Failed to remove temporary ledger: {cleanup}");
            }
            io_err(e)
        })?;
        Ok(())
    }

    /// Whether a file with modification time `mtime` needs (re)processing.
    pub fn is_stale(&self, key: &str, mtime: f64) -> bool {
        match self.entries.get(key) {
            None => true,
            Some(&recorded) => recorded < mtime,
        }
    }

    /// Reads the mtime of `path` and returns it if the file needs
    /// (re)processing. A file whose mtime cannot be read is skipped.
    pub fn stale_mtime(&self, path: &Path) -> Option<f64> {
        match modified_secs(path) {
            Ok(mtime) => self.is_stale(&path_key(path), mtime).then_some(mtime),
            Err(e) => {
                warn!("Cannot stat {}: {e}; skipping", path.display());
                None
            }
        }
    }

    pub fn merge(&mut self, pending: PendingUpdates) {
        self.entries.extend(pending);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ledger key for a path: its string form as produced by the scanner.
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Modification time as fractional seconds since the Unix epoch.
///
/// # Errors
///
/// Returns an error if the file cannot be stat'ed or reports no mtime.
pub fn modified_secs(path: &Path) -> std::io::Result<f64> {
    let modified = fs::metadata(path)?.modified()?;
    let secs = match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    };
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn system_time(secs: f64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs_f64(secs)
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::load(&dir.path().join("processed_files.json"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn malformed_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_files.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Ledger::load(&path).is_empty());

        fs::write(&path, r#"{"a.md": "yesterday"}"#).unwrap();
        assert!(Ledger::load(&path).is_empty());

        fs::write(&path, "").unwrap();
        assert!(Ledger::load(&path).is_empty());
    }

    #[test]
    fn save_then_load_round_trips_as_flat_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("processed_files.json");
        let mut ledger = Ledger::default();
        ledger.merge(PendingUpdates::from([
            ("Documents/b.md".to_string(), 20.5),
            ("Documents/a.md".to_string(), 10.0),
        ]));
        ledger.save(&path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["Documents/a.md"], 10.0);
        assert!(raw.contains("\n    \"Documents/a.md\""));
        assert_eq!(Ledger::load(&path), ledger);
    }

    #[test]
    fn save_overwrites_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_files.json");
        let mut ledger = Ledger::default();
        ledger.merge(PendingUpdates::from([("a.md".to_string(), 1.0)]));
        ledger.save(&path).unwrap();

        let fresh = Ledger::default();
        fresh.save(&path).unwrap();
        assert!(Ledger::load(&path).is_empty());
    }

    #[test]
    fn save_into_unwritable_location_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = Ledger::default()
            .save(&blocker.join("processed_files.json"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Io { .. }));
    }

    #[test]
    fn staleness_is_strictly_newer() {
        let mut ledger = Ledger::default();
        assert!(ledger.is_stale("a.md", 5.0));
        ledger.merge(PendingUpdates::from([("a.md".to_string(), 5.0)]));
        assert!(!ledger.is_stale("a.md", 5.0));
        assert!(!ledger.is_stale("a.md", 4.0));
        assert!(ledger.is_stale("a.md", 5.5));
    }

    #[test]
    fn stale_mtime_tracks_file_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");
        fs::write(&path, "hello").unwrap();
        let mut ledger = Ledger::default();
        let mtime = modified_secs(&path).unwrap();
        assert_eq!(ledger.stale_mtime(&path), Some(mtime));

        ledger.merge(PendingUpdates::from([(path_key(&path), mtime)]));
        assert_eq!(ledger.stale_mtime(&path), None);

        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(system_time(mtime + 10.0)).unwrap();
        assert!(ledger.stale_mtime(&path).is_some_and(|newer| newer > mtime));
    }

    #[test]
    fn vanished_file_is_not_processed() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::default();
        assert_eq!(ledger.stale_mtime(&dir.path().join("gone.md")), None);
    }
}
