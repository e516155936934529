//! Playback session state and derived projections.

use std::time::Duration;

use crate::media::LoadToken;
use crate::model::Track;

/// Current playback status.
///
/// `Loading` covers the window between a load request and the media
/// element's ready signal; nothing is audible in that state, so the
/// session can never claim "playing" without an active load behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Loading,
    Playing,
    Paused,
}

impl PlaybackStatus {
    /// Whether audio is audibly playing.
    pub fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }
}

/// What to do once an in-flight load signals readiness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadIntent {
    /// Begin audible playback (normal transport path).
    Play,
    /// Seek to the saved position without playing (session restore).
    RestoreAt(Duration),
}

/// The track that was current before a load replaced it.
///
/// Kept so a failed load can put the session back exactly where it was.
#[derive(Debug, Clone)]
pub struct PriorPlayback {
    pub track: Track,
    pub index: usize,
    pub status: PlaybackStatus,
}

/// Bookkeeping for the load currently in flight.
#[derive(Debug, Clone)]
pub struct PendingLoad {
    /// Token echoed back by the media element's ready/failed signals
    pub token: LoadToken,
    /// What to do when the load completes
    pub intent: LoadIntent,
    /// State to revert to if the load fails
    pub prior: Option<PriorPlayback>,
}

/// The playback session's single source of truth.
///
/// One instance per process, read by every UI surface, mutated only
/// through [`PlaybackSession`] operations.
///
/// [`PlaybackSession`]: super::PlaybackSession
#[derive(Debug, Clone)]
pub struct SessionState {
    /// The ordered list the transport navigates (duplicates allowed)
    pub list: Vec<Track>,
    /// Currently selected track, if any
    pub current: Option<Track>,
    /// Index of the current track in `list`; meaningless when `list` is empty
    pub index: usize,
    /// Current playback status
    pub status: PlaybackStatus,
    /// Shuffle mode: next/previous draw a uniform random index
    pub shuffle: bool,
    /// Repeat mode: the current track replays on end
    pub repeat: bool,
    /// Volume level (0.0 - 1.0)
    pub volume: f32,
    /// Muted flag (volume is preserved underneath)
    pub muted: bool,
    /// Last known playback position
    pub position: Duration,
    /// Total duration of the current track
    pub duration: Duration,
    /// Monotonic load counter; the source of [`LoadToken`]s
    pub generation: u64,
    /// The load currently in flight, if any
    pub pending: Option<PendingLoad>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            list: Vec::new(),
            current: None,
            index: 0,
            status: PlaybackStatus::Stopped,
            shuffle: false,
            repeat: false,
            volume: 1.0,
            muted: false,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            generation: 0,
            pending: None,
        }
    }
}

impl SessionState {
    /// Index invariant: an empty list, or an index inside it.
    pub fn index_valid(&self) -> bool {
        self.list.is_empty() || self.index < self.list.len()
    }

    /// Mint the token for a new load request.
    pub fn next_token(&mut self) -> LoadToken {
        self.generation += 1;
        LoadToken(self.generation)
    }

    /// Read-only projection for per-row transport icons.
    pub fn now_playing(&self) -> NowPlaying {
        NowPlaying {
            track_id: self.current.as_ref().map(|t| t.id),
            is_playing: self.status.is_playing(),
        }
    }

    /// Position as a fraction of duration (0.0 - 1.0).
    pub fn position_fraction(&self) -> f32 {
        if self.duration.is_zero() {
            0.0
        } else {
            (self.position.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
        }
    }

    /// Cloned view for display surfaces.
    pub fn view(&self) -> SessionView {
        SessionView {
            current: self.current.clone(),
            index: self.index,
            list_len: self.list.len(),
            status: self.status,
            shuffle: self.shuffle,
            repeat: self.repeat,
            volume: self.volume,
            muted: self.muted,
            position: self.position,
            duration: self.duration,
        }
    }
}

/// The `{track id, playing?}` projection UI surfaces compare their rows
/// against, instead of subscribing to events row by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NowPlaying {
    pub track_id: Option<i64>,
    pub is_playing: bool,
}

/// Display snapshot of the transport state.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub current: Option<Track>,
    pub index: usize,
    pub list_len: usize,
    pub status: PlaybackStatus,
    pub shuffle: bool,
    pub repeat: bool,
    pub volume: f32,
    pub muted: bool,
    pub position: Duration,
    pub duration: Duration,
}

/// Format a duration as MM:SS or HH:MM:SS.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::track;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00");
        assert_eq!(format_duration(Duration::from_secs(65)), "1:05");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1:01:01");
    }

    #[test]
    fn test_position_fraction() {
        let mut state = SessionState::default();
        assert_eq!(state.position_fraction(), 0.0);

        state.duration = Duration::from_secs(100);
        state.position = Duration::from_secs(50);
        assert!((state.position_fraction() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_now_playing_projection() {
        let mut state = SessionState::default();
        assert_eq!(
            state.now_playing(),
            NowPlaying {
                track_id: None,
                is_playing: false
            }
        );

        state.current = Some(track(9, "t"));
        state.status = PlaybackStatus::Playing;
        let now = state.now_playing();
        assert_eq!(now.track_id, Some(9));
        assert!(now.is_playing);

        // Loading is not audible playback
        state.status = PlaybackStatus::Loading;
        assert!(!state.now_playing().is_playing);
    }

    #[test]
    fn test_index_invariant_on_empty_list() {
        let state = SessionState::default();
        assert!(state.index_valid());
    }

    #[test]
    fn test_token_generation_is_monotonic() {
        let mut state = SessionState::default();
        let a = state.next_token();
        let b = state.next_token();
        assert!(b.0 > a.0);
    }
}
