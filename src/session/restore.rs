//! Session restoration at startup.
//!
//! Reads the persisted snapshot and reconstructs the session without
//! making a sound:
//! 1. Volume/mute/shuffle/repeat apply immediately - they don't need
//!    track data.
//! 2. Track and list restoration waits (bounded) for the bulk track
//!    load; if the data never arrives, restoration is abandoned
//!    silently and the session simply starts empty.
//! 3. The ordered list is rebuilt descriptor-by-descriptor against the
//!    loaded data, falling back to the bare descriptor when a record
//!    has disappeared.
//! 4. The current track is loaded into the media element and seeked to
//!    the saved position, paused. Audible playback waits for an
//!    explicit user press.

use std::time::Duration;

use super::state::{LoadIntent, PendingLoad, PlaybackStatus};
use super::PlaybackSession;
use crate::error::Error;
use crate::model::Track;

/// How long restoration waits for the bulk track load.
pub const DATA_WAIT: Duration = Duration::from_secs(5);

impl PlaybackSession {
    /// Restore the previous session, if a usable snapshot exists.
    ///
    /// Runs once per process, after the bulk catalog load has been
    /// kicked off. Never fails: every abandonment path logs and leaves
    /// the session in a consistent (possibly empty) state.
    pub async fn restore(&self) {
        let Some(snapshot) = self.store().load(self.snapshot_max_age()) else {
            return;
        };

        // Flags first: independent of track data.
        {
            let mut st = self.state().lock();
            st.volume = snapshot.volume.clamp(0.0, 1.0);
            st.muted = snapshot.muted;
            st.shuffle = snapshot.shuffle;
            st.repeat = snapshot.repeat;
        }
        self.media().set_volume(snapshot.volume.clamp(0.0, 1.0));
        self.media().set_muted(snapshot.muted);
        self.notify_flags();

        // Bounded wait for the catalog; silent abandonment on timeout.
        if tokio::time::timeout(DATA_WAIT, self.library().wait_ready())
            .await
            .is_err()
        {
            let err = Error::restoration(format!("track data not available within {DATA_WAIT:?}"));
            tracing::warn!("session restore abandoned: {err}");
            return;
        }

        let all = self.library().tracks();

        // Rebuild the ordered list; unknown ids degrade to descriptors.
        let list: Vec<Track> = snapshot
            .list
            .iter()
            .map(|saved| {
                all.iter()
                    .find(|t| t.id == saved.id)
                    .cloned()
                    .unwrap_or_else(|| saved.clone().into_placeholder())
            })
            .collect();
        if !list.is_empty() {
            self.state().lock().list = list;
        }

        let Some(id) = snapshot.current_track_id else {
            return;
        };
        let Some(track) = all.iter().find(|t| t.id == id).cloned() else {
            tracing::info!("saved track {id} is gone from the catalog; nothing to restore");
            return;
        };

        let position = Duration::from_secs_f64(snapshot.position_seconds.max(0.0));
        let media_url = track.has_media().then(|| self.api().media_url(track.id));

        let token = {
            let mut st = self.state().lock();
            let index = if snapshot.current_index < st.list.len() {
                snapshot.current_index
            } else {
                st.list.iter().position(|t| t.id == id).unwrap_or(0)
            };
            st.index = index;
            st.duration = super::track_duration(&track);
            st.position = position;
            st.current = Some(track);
            debug_assert!(st.index_valid());

            if media_url.is_none() {
                // Metadata restored, but there is nothing to load.
                st.status = PlaybackStatus::Stopped;
                None
            } else {
                st.status = PlaybackStatus::Loading;
                let token = st.next_token();
                st.pending = Some(PendingLoad {
                    token,
                    intent: LoadIntent::RestoreAt(position),
                    prior: None,
                });
                Some(token)
            }
        };

        self.notify_now_playing();
        if let (Some(url), Some(token)) = (media_url, token) {
            self.media().load(&url, token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionSnapshot, SessionState};
    use crate::test_utils::{session_fixture, track, tracks};
    use chrono::Utc;

    fn snapshot_playing_track_two(position_secs: f64) -> SessionSnapshot {
        let mut state = SessionState::default();
        state.list = tracks(&[1, 2, 3]);
        state.current = Some(track(2, "track 2"));
        state.index = 1;
        state.volume = 0.4;
        state.shuffle = true;
        SessionSnapshot::capture(&state, Duration::from_secs_f64(position_secs))
    }

    #[tokio::test]
    async fn test_restore_is_silent_and_positioned() {
        let fx = session_fixture();
        fx.store.save(&snapshot_playing_track_two(42.0)).unwrap();
        fx.library.set_tracks(tracks(&[1, 2, 3]));

        fx.session.restore().await;
        fx.deliver_ready().await;

        let view = fx.session.view();
        assert_eq!(view.current.as_ref().map(|t| t.id), Some(2));
        assert_eq!(view.index, 1);
        assert_eq!(view.status, PlaybackStatus::Paused);
        assert_eq!(view.position, Duration::from_secs(42));

        // Loaded and seeked, but never told to play.
        assert_eq!(fx.media.load_count(), 1);
        assert_eq!(fx.media.last_seek(), Some(Duration::from_secs(42)));
        assert_eq!(fx.media.play_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flags_apply_even_when_data_never_arrives() {
        let fx = session_fixture();
        fx.store.save(&snapshot_playing_track_two(0.0)).unwrap();

        // No bulk data ever arrives; the bounded wait times out
        // (paused clock auto-advances through DATA_WAIT).
        fx.session.restore().await;

        // Flags were applied up front...
        let view = fx.session.view();
        assert_eq!(view.volume, 0.4);
        assert!(view.shuffle);

        // ...but track restoration was abandoned silently.
        assert_eq!(fx.session.current_track_info().track_id, None);
        assert_eq!(fx.media.load_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_never_applied() {
        let fx = session_fixture();
        let mut snapshot = snapshot_playing_track_two(10.0);
        snapshot.timestamp = Utc::now() - chrono::Duration::hours(2);
        fx.store.save(&snapshot).unwrap();
        fx.library.set_tracks(tracks(&[1, 2, 3]));

        fx.session.restore().await;

        let view = fx.session.view();
        assert_eq!(view.current, None);
        assert_eq!(view.list_len, 0);
        // Flags untouched too: the snapshot was discarded unread.
        assert_eq!(view.volume, 1.0);
    }

    #[tokio::test]
    async fn test_missing_tracks_degrade_to_descriptors() {
        let fx = session_fixture();
        fx.store.save(&snapshot_playing_track_two(0.0)).unwrap();
        // Track 3 vanished from the catalog.
        fx.library.set_tracks(tracks(&[1, 2]));

        fx.session.restore().await;
        fx.deliver_ready().await;

        let view = fx.session.view();
        assert_eq!(view.list_len, 3);
        assert_eq!(view.current.as_ref().map(|t| t.id), Some(2));
    }

    #[tokio::test]
    async fn test_vanished_current_track_restores_nothing() {
        let fx = session_fixture();
        fx.store.save(&snapshot_playing_track_two(0.0)).unwrap();
        fx.library.set_tracks(tracks(&[5, 6]));

        fx.session.restore().await;

        assert_eq!(fx.session.current_track_info().track_id, None);
        assert_eq!(fx.media.load_count(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_saved_index_relocates_track() {
        let fx = session_fixture();
        let mut snapshot = snapshot_playing_track_two(0.0);
        snapshot.current_index = 99;
        fx.store.save(&snapshot).unwrap();
        fx.library.set_tracks(tracks(&[1, 2, 3]));

        fx.session.restore().await;

        let view = fx.session.view();
        assert_eq!(view.index, 1); // re-located by id
        assert!(view.index < view.list_len);
    }
}
