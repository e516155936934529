//! Test utilities and fixtures for tunestream tests.
//!
//! Provides track factories, a scripted media element, a mock backend,
//! a recording surface, and a wired-up session fixture to reduce
//! boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use tunestream::test_utils::{session_fixture, tracks};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let fx = session_fixture();
//!     fx.session.set_list(tracks(&[1, 2, 3]), 0);
//!     fx.play_and_settle(1).await;
//!     // ... assertions against fx.session / fx.media / fx.surface
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::api::{ArtworkKind, DataApi};
use crate::error::{Error, Result};
use crate::library::Library;
use crate::media::{
    signal_channel, LoadToken, MediaElement, MediaSignal, SignalReceiver, SignalSender,
};
use crate::model::{Album, Artist, FavoriteTrack, Playlist, PlaylistTrack, Track};
use crate::session::{NowPlaying, PlaybackSession, SnapshotStore, TransportSurface, SNAPSHOT_FILE};

/// A playable track with sensible defaults.
pub fn track(id: i64, title: &str) -> Track {
    Track {
        id,
        title: title.to_string(),
        artist_id: None,
        album_id: None,
        genre: None,
        duration_seconds: Some(180),
        file_path: Some(format!("tracks/{id}.mp3")),
        artwork_path: None,
        play_count_all: None,
        play_count_month: None,
        play_count_week: None,
        play_count_day: None,
        is_new_release: false,
    }
}

/// Playable tracks titled after their ids.
pub fn tracks(ids: &[i64]) -> Vec<Track> {
    ids.iter().map(|&id| track(id, &format!("track {id}"))).collect()
}

/// One command received by the scripted media element.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaCommand {
    Load(String, LoadToken),
    Play,
    Pause,
    Seek(Duration),
    SetVolume(f32),
    SetMuted(bool),
}

/// Scripted media element: records commands, emits signals on demand.
pub struct FakeMedia {
    signals: SignalSender,
    commands: Mutex<Vec<MediaCommand>>,
    position: Mutex<Duration>,
    duration: Mutex<Option<Duration>>,
}

impl FakeMedia {
    pub fn new(signals: SignalSender) -> Self {
        Self {
            signals,
            commands: Mutex::new(Vec::new()),
            position: Mutex::new(Duration::ZERO),
            duration: Mutex::new(None),
        }
    }

    pub fn commands(&self) -> Vec<MediaCommand> {
        self.commands.lock().clone()
    }

    pub fn load_count(&self) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|c| matches!(c, MediaCommand::Load(..)))
            .count()
    }

    pub fn play_count(&self) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|c| matches!(c, MediaCommand::Play))
            .count()
    }

    pub fn last_load(&self) -> Option<(String, LoadToken)> {
        self.commands.lock().iter().rev().find_map(|c| match c {
            MediaCommand::Load(url, token) => Some((url.clone(), *token)),
            _ => None,
        })
    }

    pub fn last_seek(&self) -> Option<Duration> {
        self.commands.lock().iter().rev().find_map(|c| match c {
            MediaCommand::Seek(position) => Some(*position),
            _ => None,
        })
    }

    pub fn set_position(&self, position: Duration) {
        *self.position.lock() = position;
    }

    pub fn set_duration(&self, duration: Option<Duration>) {
        *self.duration.lock() = duration;
    }

    pub fn emit_ready(&self, token: LoadToken, duration: Option<Duration>) {
        let _ = self.signals.send(MediaSignal::Ready { token, duration });
    }

    pub fn emit_started(&self) {
        let _ = self.signals.send(MediaSignal::Started);
    }

    pub fn emit_paused(&self) {
        let _ = self.signals.send(MediaSignal::Paused);
    }

    pub fn emit_ended(&self) {
        let _ = self.signals.send(MediaSignal::Ended);
    }

    pub fn emit_failed(&self, token: LoadToken, message: &str) {
        let _ = self.signals.send(MediaSignal::Failed {
            token,
            message: message.to_string(),
        });
    }

    pub fn emit_position(&self, position: Duration, duration: Option<Duration>) {
        let _ = self.signals.send(MediaSignal::Position { position, duration });
    }
}

impl MediaElement for FakeMedia {
    fn load(&self, url: &str, token: LoadToken) {
        self.commands
            .lock()
            .push(MediaCommand::Load(url.to_string(), token));
    }

    fn play(&self) {
        self.commands.lock().push(MediaCommand::Play);
    }

    fn pause(&self) {
        self.commands.lock().push(MediaCommand::Pause);
    }

    fn seek(&self, position: Duration) {
        self.commands.lock().push(MediaCommand::Seek(position));
        *self.position.lock() = position;
    }

    fn set_volume(&self, volume: f32) {
        self.commands.lock().push(MediaCommand::SetVolume(volume));
    }

    fn set_muted(&self, muted: bool) {
        self.commands.lock().push(MediaCommand::SetMuted(muted));
    }

    fn position(&self) -> Duration {
        *self.position.lock()
    }

    fn duration(&self) -> Option<Duration> {
        *self.duration.lock()
    }
}

/// Mock backend with a configurable remote catalog.
#[derive(Default)]
pub struct MockApi {
    remote: Mutex<Vec<Track>>,
    fetch_track_calls: Mutex<Vec<i64>>,
    plays: Mutex<Vec<(i64, i64, u32, bool)>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks reachable only through single-item remote fetches.
    pub fn set_remote_tracks(&self, tracks: Vec<Track>) {
        *self.remote.lock() = tracks;
    }

    pub fn fetch_track_calls(&self) -> Vec<i64> {
        self.fetch_track_calls.lock().clone()
    }

    pub fn plays(&self) -> Vec<(i64, i64, u32, bool)> {
        self.plays.lock().clone()
    }
}

#[async_trait]
impl DataApi for MockApi {
    async fn fetch_tracks(&self) -> Result<Vec<Track>> {
        Ok(self.remote.lock().clone())
    }

    async fn fetch_track(&self, id: i64) -> Result<Track> {
        self.fetch_track_calls.lock().push(id);
        self.remote
            .lock()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(Error::Resolution(id))
    }

    async fn fetch_artists(&self) -> Result<Vec<Artist>> {
        Ok(Vec::new())
    }

    async fn fetch_albums(&self) -> Result<Vec<Album>> {
        Ok(Vec::new())
    }

    async fn fetch_playlists(&self, _user_id: i64) -> Result<Vec<Playlist>> {
        Ok(Vec::new())
    }

    async fn fetch_playlist_tracks(&self, _playlist_id: i64) -> Result<Vec<PlaylistTrack>> {
        Ok(Vec::new())
    }

    async fn fetch_favorite_tracks(&self, _user_id: i64) -> Result<Vec<FavoriteTrack>> {
        Ok(Vec::new())
    }

    async fn record_play(
        &self,
        user_id: i64,
        track_id: i64,
        duration_seconds: u32,
        completed: bool,
    ) -> Result<()> {
        self.plays
            .lock()
            .push((user_id, track_id, duration_seconds, completed));
        Ok(())
    }

    fn media_url(&self, track_id: i64) -> String {
        format!("http://mock.local/api/files/tracks/{track_id}")
    }

    fn artwork_url(&self, kind: ArtworkKind, id: i64) -> String {
        let segment = match kind {
            ArtworkKind::Track => "tracks",
            ArtworkKind::Album => "albums",
            ArtworkKind::Artist => "artists",
        };
        format!("http://mock.local/api/files/artwork/{segment}/{id}")
    }
}

/// Surface that records every notification it receives.
#[derive(Default)]
pub struct RecordingSurface {
    now_playing: Mutex<Vec<NowPlaying>>,
    errors: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl RecordingSurface {
    pub fn now_playing_events(&self) -> Vec<NowPlaying> {
        self.now_playing.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

impl TransportSurface for RecordingSurface {
    fn now_playing_changed(&self, now: &NowPlaying) {
        self.now_playing.lock().push(*now);
    }

    fn playback_error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }

    fn prompt(&self, message: &str) {
        self.prompts.lock().push(message.to_string());
    }
}

/// A fully wired session over fakes.
pub struct Fixture {
    pub session: Arc<PlaybackSession>,
    pub library: Arc<Library>,
    pub media: Arc<FakeMedia>,
    pub api: Arc<MockApi>,
    pub surface: Arc<RecordingSurface>,
    /// Second handle onto the session's snapshot file
    pub store: SnapshotStore,
    signals: Mutex<SignalReceiver>,
    _dir: tempfile::TempDir,
}

impl Fixture {
    /// Apply every signal the media element has emitted so far.
    pub async fn drain_signals(&self) {
        loop {
            let signal = self.signals.lock().try_recv();
            match signal {
                Ok(signal) => self.session.apply_signal(signal).await,
                Err(_) => break,
            }
        }
    }

    /// Answer the most recent load with a ready signal and apply it.
    pub async fn deliver_ready(&self) {
        if let Some((_, token)) = self.media.last_load() {
            self.media.emit_ready(token, self.media.duration());
        }
        self.drain_signals().await;
    }

    /// Play a track all the way to audible playback.
    pub async fn play_and_settle(&self, id: i64) {
        self.session
            .play_by_id(id)
            .await
            .expect("play_by_id failed in fixture");
        self.deliver_ready().await;
        self.media.emit_started();
        self.drain_signals().await;
    }
}

/// Build a session wired to fakes, with an empty library.
pub fn session_fixture() -> Fixture {
    let (signal_tx, signal_rx) = signal_channel();
    let library = Arc::new(Library::new());
    let media = Arc::new(FakeMedia::new(signal_tx));
    let api = Arc::new(MockApi::new());
    let surface = Arc::new(RecordingSurface::default());

    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let snapshot_path = dir.path().join(SNAPSHOT_FILE);

    let session = Arc::new(PlaybackSession::new(
        Arc::clone(&library),
        Arc::clone(&api) as Arc<dyn DataApi>,
        Arc::clone(&media) as Arc<dyn MediaElement>,
        SnapshotStore::new(&snapshot_path),
        Some(7),
        Duration::from_secs(60 * 60),
    ));
    session.register_surface(Arc::clone(&surface) as Arc<dyn TransportSurface>);

    Fixture {
        session,
        library,
        media,
        api,
        surface,
        store: SnapshotStore::new(snapshot_path),
        signals: Mutex::new(signal_rx),
        _dir: dir,
    }
}
