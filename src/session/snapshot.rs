//! Session snapshot persistence.
//!
//! A serialized projection of the session state is written to a single
//! JSON file in the OS data directory - the client's durable storage
//! entry - and read back once at startup. Saves happen on a fixed
//! cadence, throttled during position updates, and immediately on
//! play/pause transitions. A snapshot older than one hour is discarded
//! unread rather than restored.
//!
//! Storage failures are never surfaced: the caller logs and playback
//! continues.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::SessionState;
use crate::error::{Error, Result};
use crate::model::Track;

/// File name of the single snapshot entry.
pub const SNAPSHOT_FILE: &str = "player-state.json";

/// Minimal per-track descriptor persisted for the ordered list.
///
/// Enough to re-identify the full record after a reload, and to stand
/// in for it (degraded, unplayable) if the record has disappeared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRef {
    pub id: i64,
    pub title: String,
    pub artist_id: Option<i64>,
    pub album_id: Option<i64>,
}

impl From<&Track> for TrackRef {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id,
            title: track.title.clone(),
            artist_id: track.artist_id,
            album_id: track.album_id,
        }
    }
}

impl TrackRef {
    /// Materialize a placeholder track from the descriptor alone.
    ///
    /// Has no media file, so selecting it reports a playback failure
    /// instead of crashing - degraded but non-fatal.
    pub fn into_placeholder(self) -> Track {
        Track {
            id: self.id,
            title: self.title,
            artist_id: self.artist_id,
            album_id: self.album_id,
            genre: None,
            duration_seconds: None,
            file_path: None,
            artwork_path: None,
            play_count_all: None,
            play_count_month: None,
            play_count_week: None,
            play_count_day: None,
            is_new_release: false,
        }
    }
}

/// The serializable projection of the session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub current_track_id: Option<i64>,
    pub current_index: usize,
    pub list: Vec<TrackRef>,
    pub is_playing: bool,
    pub position_seconds: f64,
    pub volume: f32,
    pub muted: bool,
    pub shuffle: bool,
    pub repeat: bool,
    /// Used solely for the staleness check on restore
    pub timestamp: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Project the current session state for persistence.
    pub fn capture(state: &SessionState, position: Duration) -> Self {
        Self {
            current_track_id: state.current.as_ref().map(|t| t.id),
            current_index: state.index,
            list: state.list.iter().map(TrackRef::from).collect(),
            is_playing: state.status.is_playing(),
            position_seconds: position.as_secs_f64(),
            volume: state.volume,
            muted: state.muted,
            shuffle: state.shuffle,
            repeat: state.repeat,
            timestamp: Utc::now(),
        }
    }

    /// Whether the snapshot is older than `max_age`.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.timestamp);
        // A future timestamp (clock skew) reads as age zero, not stale.
        age.to_std().is_ok_and(|age| age > max_age)
    }
}

/// File-backed store for the single snapshot entry.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Create a store at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the OS-standard data directory, if one exists.
    pub fn default_location() -> Option<Self> {
        dirs::data_local_dir().map(|d| Self::new(d.join("tunestream").join(SNAPSHOT_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot, overwriting any prior one.
    ///
    /// Writes atomically (temp file + rename) so a crash mid-save
    /// never leaves a truncated snapshot behind.
    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::persistence(format!("create {dir:?}: {e}")))?;
        }

        let contents = serde_json::to_vec(snapshot)
            .map_err(|e| Error::persistence(format!("encode snapshot: {e}")))?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, &contents)
            .map_err(|e| Error::persistence(format!("write {temp_path:?}: {e}")))?;
        std::fs::rename(&temp_path, &self.path)
            .map_err(|e| Error::persistence(format!("rename into {:?}: {e}", self.path)))?;

        Ok(())
    }

    /// Read the snapshot, discarding stale or unreadable entries.
    ///
    /// Returns `None` when there is nothing to restore; never fails.
    pub fn load(&self, max_age: Duration) -> Option<SessionSnapshot> {
        let contents = match std::fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("failed to read snapshot {:?}: {e}", self.path);
                return None;
            }
        };

        let snapshot: SessionSnapshot = match serde_json::from_slice(&contents) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("discarding corrupt snapshot {:?}: {e}", self.path);
                self.clear();
                return None;
            }
        };

        if snapshot.is_stale(max_age) {
            tracing::info!("discarding snapshot older than {:?}", max_age);
            self.clear();
            return None;
        }

        Some(snapshot)
    }

    /// Remove the snapshot entry, ignoring failures.
    pub fn clear(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::PlaybackStatus;
    use crate::test_utils::track;

    const MAX_AGE: Duration = Duration::from_secs(60 * 60);

    fn sample_state() -> SessionState {
        let mut state = SessionState::default();
        state.list = vec![track(1, "one"), track(2, "two")];
        state.current = Some(track(2, "two"));
        state.index = 1;
        state.status = PlaybackStatus::Playing;
        state.volume = 0.6;
        state.shuffle = true;
        state
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join(SNAPSHOT_FILE));

        let snapshot = SessionSnapshot::capture(&sample_state(), Duration::from_secs(42));
        store.save(&snapshot).unwrap();

        let loaded = store.load(MAX_AGE).unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.current_track_id, Some(2));
        assert_eq!(loaded.position_seconds, 42.0);
        assert_eq!(loaded.list.len(), 2);
    }

    #[test]
    fn test_save_overwrites_prior_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join(SNAPSHOT_FILE));

        let mut first = SessionSnapshot::capture(&sample_state(), Duration::ZERO);
        first.volume = 0.1;
        store.save(&first).unwrap();

        let second = SessionSnapshot::capture(&sample_state(), Duration::from_secs(7));
        store.save(&second).unwrap();

        assert_eq!(store.load(MAX_AGE).unwrap(), second);
    }

    #[test]
    fn test_stale_snapshot_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join(SNAPSHOT_FILE));

        let mut snapshot = SessionSnapshot::capture(&sample_state(), Duration::ZERO);
        snapshot.timestamp = Utc::now() - chrono::Duration::hours(2);
        store.save(&snapshot).unwrap();

        assert!(store.load(MAX_AGE).is_none());
        // The entry is removed, not just skipped
        assert!(!store.path().exists());
    }

    #[test]
    fn test_just_under_the_bound_survives() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join(SNAPSHOT_FILE));

        let mut snapshot = SessionSnapshot::capture(&sample_state(), Duration::ZERO);
        snapshot.timestamp = Utc::now() - chrono::Duration::minutes(59);
        store.save(&snapshot).unwrap();

        assert!(store.load(MAX_AGE).is_some());
    }

    #[test]
    fn test_corrupt_snapshot_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join(SNAPSHOT_FILE));

        std::fs::write(store.path(), b"{not json").unwrap();
        assert!(store.load(MAX_AGE).is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join(SNAPSHOT_FILE));
        assert!(store.load(MAX_AGE).is_none());
    }

    #[test]
    fn test_placeholder_track_has_no_media() {
        let track_ref = TrackRef {
            id: 5,
            title: "ghost".to_string(),
            artist_id: Some(1),
            album_id: None,
        };
        let placeholder = track_ref.into_placeholder();
        assert_eq!(placeholder.id, 5);
        assert!(!placeholder.has_media());
    }
}
