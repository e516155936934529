//! The playback session: what is playing, from which ordered list, at
//! what position.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                     UI surfaces (any page)                     │
//! │   play_by_id / next / seek / ... ──────► PlaybackSession       │
//! │   per-row icons ◄────────────────────── current_track_info()   │
//! └───────────────────────────────┬────────────────────────────────┘
//! │ commands                      │ MediaSignals (event pump)
//! ▼                               │
//! ┌───────────────────────────────┴────────────────────────────────┐
//! │                   MediaElement (opaque primitive)              │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The session is a single injected object shared by every surface:
//! one writer path (its operations), many readers. State mutation in
//! `play_by_id` happens synchronously before the asynchronous media
//! load is requested, so rapid repeated calls observe a consistent
//! current track and collapse into toggle semantics.

mod events;
mod resolve;
mod restore;
mod snapshot;
mod state;

pub use events::run_event_pump;
pub use snapshot::{SessionSnapshot, SnapshotStore, TrackRef, SNAPSHOT_FILE};
pub use state::{
    format_duration, LoadIntent, NowPlaying, PendingLoad, PlaybackStatus, PriorPlayback,
    SessionState, SessionView,
};

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use rand::Rng;

use crate::api::DataApi;
use crate::error::{Error, Result};
use crate::library::Library;
use crate::media::MediaElement;
use crate::model::Track;

/// Minimum gap between snapshot saves driven by position updates.
const POSITION_SAVE_WINDOW: Duration = Duration::from_secs(2);

/// A UI surface rendering transport state.
///
/// Surfaces register once with the session; the event layer notifies
/// them on transitions and they re-derive per-row icons by comparing
/// their rows against [`NowPlaying`]. No surface subscribes to media
/// events directly.
pub trait TransportSurface: Send + Sync {
    /// The current track or play/pause state changed.
    fn now_playing_changed(&self, now: &NowPlaying);

    /// Playback position advanced (high frequency).
    fn progress_changed(&self, _position: Duration, _duration: Duration) {}

    /// Shuffle/repeat/volume/mute indicators changed.
    fn flags_changed(&self, _shuffle: bool, _repeat: bool, _volume: f32, _muted: bool) {}

    /// A foreground playback failure the user must see.
    fn playback_error(&self, _message: &str) {}

    /// A prompt for user action (e.g. no track selected yet).
    fn prompt(&self, _message: &str) {}
}

/// Direction for list navigation.
#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

/// The playback session core.
pub struct PlaybackSession {
    state: Mutex<SessionState>,
    library: Arc<Library>,
    api: Arc<dyn DataApi>,
    media: Arc<dyn MediaElement>,
    store: SnapshotStore,
    surfaces: RwLock<Vec<Arc<dyn TransportSurface>>>,
    user_id: Option<i64>,
    snapshot_max_age: Duration,
    last_position_save: Mutex<Instant>,
}

impl PlaybackSession {
    /// Create a session over its collaborators.
    pub fn new(
        library: Arc<Library>,
        api: Arc<dyn DataApi>,
        media: Arc<dyn MediaElement>,
        store: SnapshotStore,
        user_id: Option<i64>,
        snapshot_max_age: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            library,
            api,
            media,
            store,
            surfaces: RwLock::new(Vec::new()),
            user_id,
            snapshot_max_age,
            last_position_save: Mutex::new(Instant::now()),
        }
    }

    /// Register a UI surface for transport notifications.
    pub fn register_surface(&self, surface: Arc<dyn TransportSurface>) {
        self.surfaces.write().push(surface);
    }

    // ========================================================================
    // Transport operations
    // ========================================================================

    /// Replace the ordered list and prime the starting position.
    ///
    /// Never starts playback: call sites prepare lists "for later"
    /// (an album page, a playlist) and only an explicit play call
    /// should make sound. An empty list is rejected; an out-of-range
    /// start index resets to 0.
    pub fn set_list(&self, tracks: Vec<Track>, start_index: usize) {
        if tracks.is_empty() {
            tracing::warn!("ignoring empty session list");
            return;
        }
        let start_index = if start_index < tracks.len() {
            start_index
        } else {
            0
        };

        let mut st = self.state.lock();
        st.list = tracks;
        st.index = start_index;
    }

    /// Primary transport entry point: play, resume, or pause a track.
    ///
    /// Same track playing: pause (position preserved). Same track
    /// paused: resume (position preserved). Different track: resolve,
    /// become current, load, and start playback once the media element
    /// signals readiness.
    pub async fn play_by_id(&self, id: i64) -> Result<()> {
        // Same-track fast paths: toggle rather than reload.
        {
            let st = self.state.lock();
            if st.current.as_ref().map(|t| t.id) == Some(id) {
                match st.status {
                    PlaybackStatus::Playing => {
                        drop(st);
                        self.media.pause();
                        return Ok(());
                    }
                    PlaybackStatus::Paused => {
                        drop(st);
                        self.media.play();
                        return Ok(());
                    }
                    // A load for this track is already in flight.
                    PlaybackStatus::Loading => return Ok(()),
                    // Stopped (e.g. after a failed load): reload below.
                    PlaybackStatus::Stopped => {}
                }
            }
        }

        let resolved = match self.resolve(id).await {
            Ok(resolved) => resolved,
            Err(e) => {
                self.notify_error("Track not found. Try refreshing the page.");
                return Err(e);
            }
        };

        if !resolved.track.has_media() {
            self.notify_error("This track has no media file yet.");
            return Err(Error::media_load(format!(
                "track {} ({}) has no media file",
                resolved.track.id, resolved.track.title
            )));
        }

        let url = self.api.media_url(resolved.track.id);

        // State changes land synchronously, before the load is even
        // requested: a second call racing this one already sees the
        // new current track.
        let token = {
            let mut st = self.state.lock();
            let prior = st.current.clone().map(|track| PriorPlayback {
                track,
                index: st.index,
                status: st.status,
            });
            if let Some(list) = resolved.promoted_list {
                st.list = list;
            }
            st.index = resolved.index;
            st.duration = track_duration(&resolved.track);
            st.current = Some(resolved.track);
            st.status = PlaybackStatus::Loading;
            st.position = Duration::ZERO;
            let token = st.next_token();
            st.pending = Some(PendingLoad {
                token,
                intent: LoadIntent::Play,
                prior,
            });
            debug_assert!(st.index_valid());
            token
        };

        self.notify_now_playing();
        self.media.load(&url, token);
        Ok(())
    }

    /// Toggle play/pause of the current track.
    pub fn toggle_play_pause(&self) {
        let status = {
            let st = self.state.lock();
            if st.current.is_none() {
                drop(st);
                self.notify_prompt("Pick a track to start playback.");
                return;
            }
            st.status
        };

        match status {
            PlaybackStatus::Playing => self.media.pause(),
            PlaybackStatus::Paused | PlaybackStatus::Stopped => self.media.play(),
            PlaybackStatus::Loading => {}
        }
    }

    /// Advance to the next track (random under shuffle, wraparound otherwise).
    pub async fn next(&self) -> Result<()> {
        self.step(Direction::Forward).await
    }

    /// Go back to the previous track (random under shuffle, wraparound otherwise).
    pub async fn previous(&self) -> Result<()> {
        self.step(Direction::Backward).await
    }

    async fn step(&self, direction: Direction) -> Result<()> {
        let target_id = {
            let mut st = self.state.lock();

            // An empty session list adopts whatever the user has been
            // looking at: favorites, then the displayed list, then the
            // full catalog cache.
            if st.list.is_empty() {
                let Some(fallback) = self.fallback_list() else {
                    tracing::warn!("no list available for {:?} navigation", direction);
                    return Ok(());
                };
                st.list = fallback;
                let position = match &st.current {
                    Some(current) => st
                        .list
                        .iter()
                        .position(|t| t.id == current.id)
                        .unwrap_or(0),
                    None => 0,
                };
                st.index = position;
            }

            if st.index >= st.list.len() {
                st.index = 0;
            }

            let len = st.list.len();
            let next_index = if st.shuffle {
                // Uniform draw; may re-select the current index.
                rand::rng().random_range(0..len)
            } else {
                match direction {
                    Direction::Forward => (st.index + 1) % len,
                    Direction::Backward => (st.index + len - 1) % len,
                }
            };

            st.list[next_index].id
        };

        self.play_by_id(target_id).await
    }

    fn fallback_list(&self) -> Option<Vec<Track>> {
        [
            self.library.favorites(),
            self.library.displayed(),
            self.library.tracks(),
        ]
        .into_iter()
        .find(|list| !list.is_empty())
    }

    /// React to the current track playing to its end.
    pub(crate) async fn handle_track_end(&self) {
        self.record_play(true);

        let repeat = self.state.lock().repeat;
        if repeat {
            self.media.seek(Duration::ZERO);
            self.media.play();
        } else if let Err(e) = self.next().await {
            tracing::warn!("auto-advance after track end failed: {e}");
        }
    }

    /// Jump to a fractional position in the current track.
    ///
    /// The displayed position updates immediately, ahead of the media
    /// element's own position events.
    pub fn seek(&self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        let duration = self
            .media
            .duration()
            .unwrap_or_else(|| self.state.lock().duration);
        if duration.is_zero() {
            return;
        }

        let target = duration.mul_f64(fraction);
        self.media.seek(target);
        self.state.lock().position = target;
        self.notify_progress(target, duration);
    }

    /// Set the volume (0.0 - 1.0). Zero also flips the mute flag on.
    pub fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        {
            let mut st = self.state.lock();
            st.volume = volume;
            st.muted = volume == 0.0;
        }
        self.media.set_volume(volume);
        self.media.set_muted(volume == 0.0);
        self.notify_flags();
    }

    /// Toggle mute without losing the volume level.
    pub fn toggle_mute(&self) {
        let muted = {
            let mut st = self.state.lock();
            st.muted = !st.muted;
            st.muted
        };
        self.media.set_muted(muted);
        self.notify_flags();
    }

    /// Toggle shuffle mode.
    pub fn toggle_shuffle(&self) {
        {
            let mut st = self.state.lock();
            st.shuffle = !st.shuffle;
        }
        self.notify_flags();
    }

    /// Toggle repeat mode.
    pub fn toggle_repeat(&self) {
        {
            let mut st = self.state.lock();
            st.repeat = !st.repeat;
        }
        self.notify_flags();
    }

    /// The `{track id, playing?}` projection for per-row icons.
    pub fn current_track_info(&self) -> NowPlaying {
        self.state.lock().now_playing()
    }

    /// Display snapshot of the transport state.
    pub fn view(&self) -> SessionView {
        self.state.lock().view()
    }

    // ========================================================================
    // Background work
    // ========================================================================

    /// Save a snapshot now; storage failures are logged and swallowed.
    pub fn save_now(&self, reason: &str) {
        let snapshot = {
            let st = self.state.lock();
            SessionSnapshot::capture(&st, self.media.position())
        };
        if let Err(e) = self.store.save(&snapshot) {
            tracing::warn!("snapshot save failed ({reason}): {e}");
        }
    }

    /// Save driven by a position update, at most once per throttle window.
    pub(crate) fn save_throttled(&self) {
        let mut last = self.last_position_save.lock();
        if last.elapsed() >= POSITION_SAVE_WINDOW {
            *last = Instant::now();
            drop(last);
            self.save_now("position update");
        }
    }

    /// Record a play event, fire-and-forget.
    ///
    /// Skipped when no user session exists. Failures are logged at
    /// debug and never block or surface - analytics must not affect
    /// playback.
    pub(crate) fn record_play(&self, completed: bool) {
        let Some(user_id) = self.user_id else { return };
        let (track_id, duration) = {
            let st = self.state.lock();
            match &st.current {
                Some(track) => (track.id, st.duration),
                None => return,
            }
        };
        let duration_seconds = if completed { duration.as_secs() as u32 } else { 0 };

        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            if let Err(e) = api
                .record_play(user_id, track_id, duration_seconds, completed)
                .await
            {
                tracing::debug!("play event for track {track_id} not recorded: {e}");
            }
        });
    }

    // ========================================================================
    // Surface notifications
    // ========================================================================

    fn surfaces(&self) -> Vec<Arc<dyn TransportSurface>> {
        self.surfaces.read().clone()
    }

    pub(crate) fn notify_now_playing(&self) {
        let now = self.current_track_info();
        for surface in self.surfaces() {
            surface.now_playing_changed(&now);
        }
    }

    pub(crate) fn notify_progress(&self, position: Duration, duration: Duration) {
        for surface in self.surfaces() {
            surface.progress_changed(position, duration);
        }
    }

    pub(crate) fn notify_flags(&self) {
        let (shuffle, repeat, volume, muted) = {
            let st = self.state.lock();
            (st.shuffle, st.repeat, st.volume, st.muted)
        };
        for surface in self.surfaces() {
            surface.flags_changed(shuffle, repeat, volume, muted);
        }
    }

    pub(crate) fn notify_error(&self, message: &str) {
        tracing::error!("{message}");
        for surface in self.surfaces() {
            surface.playback_error(message);
        }
    }

    fn notify_prompt(&self, message: &str) {
        for surface in self.surfaces() {
            surface.prompt(message);
        }
    }

    // ========================================================================
    // State access for submodules
    // ========================================================================

    pub(crate) fn state(&self) -> &Mutex<SessionState> {
        &self.state
    }

    pub(crate) fn library(&self) -> &Library {
        &self.library
    }

    pub(crate) fn api(&self) -> &dyn DataApi {
        self.api.as_ref()
    }

    pub(crate) fn media(&self) -> &dyn MediaElement {
        self.media.as_ref()
    }

    pub(crate) fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub(crate) fn snapshot_max_age(&self) -> Duration {
        self.snapshot_max_age
    }
}

pub(crate) fn track_duration(track: &Track) -> Duration {
    track
        .duration_seconds
        .map(|s| Duration::from_secs(u64::from(s)))
        .unwrap_or_default()
}

/// Periodic snapshot saves, independent of transitions.
pub async fn run_autosave(session: Arc<PlaybackSession>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so startup state
    // doesn't clobber a snapshot that restoration hasn't read yet.
    interval.tick().await;
    loop {
        interval.tick().await;
        session.save_now("interval");
    }
}
