//! Process-wide catalog caches shared by every UI surface.
//!
//! A single [`Library`] instance is constructed at startup and injected
//! into the session, the resolvers, and every surface - there is one
//! playback truth and one set of caches, no per-surface copies.
//!
//! The track/artist/album caches are append-only for the process
//! lifetime: bulk fetches replace the whole set, point fetches merge in
//! without duplicating, and nothing is evicted. The favorites and
//! displayed lists mirror what the user is currently looking at and
//! back the transport's fallback-list chain.

use parking_lot::RwLock;
use tokio::sync::watch;

use crate::model::{Album, Artist, Track};

/// Shared catalog caches and view lists.
pub struct Library {
    tracks: RwLock<Vec<Track>>,
    artists: RwLock<Vec<Artist>>,
    albums: RwLock<Vec<Album>>,
    /// The user's favorite tracks, as last loaded into a view
    favorites: RwLock<Vec<Track>>,
    /// The list currently rendered on screen (filtered or not)
    displayed: RwLock<Vec<Track>>,
    ready_tx: watch::Sender<bool>,
}

impl Library {
    /// Create an empty library. Bulk data arrives later via [`set_tracks`].
    ///
    /// [`set_tracks`]: Library::set_tracks
    pub fn new() -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            tracks: RwLock::new(Vec::new()),
            artists: RwLock::new(Vec::new()),
            albums: RwLock::new(Vec::new()),
            favorites: RwLock::new(Vec::new()),
            displayed: RwLock::new(Vec::new()),
            ready_tx,
        }
    }

    /// Replace the track cache with a bulk fetch result and mark the
    /// library ready for restoration.
    pub fn set_tracks(&self, tracks: Vec<Track>) {
        *self.tracks.write() = tracks;
        // Wake anyone awaiting readiness, even if the list is empty -
        // the bulk load has completed either way.
        self.ready_tx.send_replace(true);
    }

    /// Merge a point-fetched track into the cache without duplicating.
    pub fn merge_track(&self, track: Track) {
        let mut tracks = self.tracks.write();
        if let Some(existing) = tracks.iter_mut().find(|t| t.id == track.id) {
            *existing = track;
        } else {
            tracks.push(track);
        }
    }

    /// Look up a cached track by id.
    pub fn track(&self, id: i64) -> Option<Track> {
        self.tracks.read().iter().find(|t| t.id == id).cloned()
    }

    /// Snapshot of the full track cache.
    pub fn tracks(&self) -> Vec<Track> {
        self.tracks.read().clone()
    }

    /// Look up a cached artist by id.
    pub fn artist(&self, id: i64) -> Option<Artist> {
        self.artists.read().iter().find(|a| a.id == id).cloned()
    }

    /// Look up a cached album by id.
    pub fn album(&self, id: i64) -> Option<Album> {
        self.albums.read().iter().find(|a| a.id == id).cloned()
    }

    pub fn set_artists(&self, artists: Vec<Artist>) {
        *self.artists.write() = artists;
    }

    pub fn set_albums(&self, albums: Vec<Album>) {
        *self.albums.write() = albums;
    }

    /// Update the favorites view list.
    pub fn set_favorites(&self, tracks: Vec<Track>) {
        *self.favorites.write() = tracks;
    }

    /// Update the currently-displayed view list.
    pub fn set_displayed(&self, tracks: Vec<Track>) {
        *self.displayed.write() = tracks;
    }

    pub fn favorites(&self) -> Vec<Track> {
        self.favorites.read().clone()
    }

    pub fn displayed(&self) -> Vec<Track> {
        self.displayed.read().clone()
    }

    /// Whether the bulk track load has completed.
    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Wait until the bulk track load completes.
    ///
    /// Resolves immediately if the load already happened. Callers bound
    /// the wait with their own timeout.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready_tx.subscribe();
        // Ignore a closed channel: the sender lives as long as self.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::track;

    #[test]
    fn test_merge_track_no_duplicates() {
        let library = Library::new();
        library.set_tracks(vec![track(1, "one"), track(2, "two")]);

        library.merge_track(track(2, "two updated"));
        assert_eq!(library.tracks().len(), 2);
        assert_eq!(library.track(2).unwrap().title, "two updated");

        library.merge_track(track(3, "three"));
        assert_eq!(library.tracks().len(), 3);
    }

    #[test]
    fn test_ready_flag() {
        let library = Library::new();
        assert!(!library.is_ready());
        library.set_tracks(Vec::new());
        assert!(library.is_ready());
    }

    #[tokio::test]
    async fn test_wait_ready_resolves_after_bulk_load() {
        let library = std::sync::Arc::new(Library::new());

        let waiter = {
            let library = library.clone();
            tokio::spawn(async move { library.wait_ready().await })
        };

        library.set_tracks(vec![track(1, "one")]);
        waiter.await.unwrap();
        assert!(library.is_ready());
    }

    #[tokio::test]
    async fn test_wait_ready_immediate_when_already_loaded() {
        let library = Library::new();
        library.set_tracks(vec![track(1, "one")]);
        // Must not hang
        library.wait_ready().await;
    }
}
