//! Tiered track resolution.
//!
//! Turns a track id into a full record, first hit wins:
//! 1. The session's active ordered list
//! 2. The process-wide track cache
//! 3. A single-item remote fetch, merged back into the cache so any
//!    later lookup - from any surface - hits tier 2 instead of the
//!    network.

use super::PlaybackSession;
use crate::error::{Error, Result};
use crate::model::Track;

/// A successful resolution, with the list context playback needs.
pub(crate) struct Resolved {
    pub track: Track,
    /// Index the track will occupy in the session list
    pub index: usize,
    /// Replacement list when the track was outside the active one
    pub promoted_list: Option<Vec<Track>>,
}

impl PlaybackSession {
    pub(crate) async fn resolve(&self, id: i64) -> Result<Resolved> {
        // Tier 1: the active ordered list.
        {
            let st = self.state().lock();
            if let Some(index) = st.list.iter().position(|t| t.id == id) {
                return Ok(Resolved {
                    track: st.list[index].clone(),
                    index,
                    promoted_list: None,
                });
            }
        }

        // Tier 2: the shared track cache.
        if let Some(track) = self.library().track(id) {
            return Ok(self.promote(track));
        }

        // Tier 3: remote fetch, merged into the cache.
        match self.api().fetch_track(id).await {
            Ok(track) => {
                self.library().merge_track(track.clone());
                Ok(self.promote(track))
            }
            Err(Error::Resolution(_)) => Err(Error::Resolution(id)),
            Err(e) => {
                tracing::warn!("remote fetch for track {id} failed: {e}");
                Err(Error::Resolution(id))
            }
        }
    }

    /// Adopt the full cache as the session list so next/previous keep
    /// working after jumping to a track outside the current list.
    fn promote(&self, track: Track) -> Resolved {
        let list = self.library().tracks();
        let index = list
            .iter()
            .position(|t| t.id == track.id)
            .unwrap_or_default();
        Resolved {
            track,
            index,
            promoted_list: Some(list),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::test_utils::{session_fixture, track, tracks};

    #[tokio::test]
    async fn test_active_list_wins() {
        let fx = session_fixture();
        // Same id exists in the cache with a different title; the list
        // copy must win.
        fx.library.set_tracks(vec![track(1, "cache copy")]);
        fx.session.set_list(vec![track(1, "list copy")], 0);

        let resolved = fx.session.resolve(1).await.unwrap();
        assert_eq!(resolved.track.title, "list copy");
        assert_eq!(resolved.index, 0);
        assert!(resolved.promoted_list.is_none());
        assert!(fx.api.fetch_track_calls().is_empty());
    }

    #[tokio::test]
    async fn test_cache_hit_promotes_full_cache() {
        let fx = session_fixture();
        fx.library.set_tracks(tracks(&[5, 6, 7]));

        let resolved = fx.session.resolve(6).await.unwrap();
        assert_eq!(resolved.track.id, 6);
        assert_eq!(resolved.index, 1);
        let promoted = resolved.promoted_list.unwrap();
        assert_eq!(promoted.len(), 3);
        assert!(fx.api.fetch_track_calls().is_empty());
    }

    #[tokio::test]
    async fn test_remote_fetch_merges_into_cache() {
        let fx = session_fixture();
        fx.api.set_remote_tracks(vec![track(42, "remote only")]);

        let resolved = fx.session.resolve(42).await.unwrap();
        assert_eq!(resolved.track.id, 42);
        assert_eq!(fx.api.fetch_track_calls(), vec![42]);

        // A second resolution - as any other surface would issue - hits
        // the cache, not the network.
        let again = fx.session.resolve(42).await.unwrap();
        assert_eq!(again.track.id, 42);
        assert_eq!(fx.api.fetch_track_calls(), vec![42]);
    }

    #[tokio::test]
    async fn test_unresolvable_id_fails() {
        let fx = session_fixture();
        let result = fx.session.resolve(404).await;
        assert!(matches!(result, Err(Error::Resolution(404))));
    }
}
