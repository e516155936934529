//! HTTP client for the streaming backend's API gateway.
//!
//! Thin request/response wrappers over the catalog and user services.
//! All reads used by the playback session go through the [`DataApi`]
//! trait so tests can substitute a mock backend.
//!
//! Routes (behind the gateway):
//! - `GET  /api/tracks`, `GET /api/tracks/{id}`
//! - `POST /api/tracks/{id}/play` (play analytics, fire-and-forget)
//! - `GET  /api/artists`, `GET /api/albums`
//! - `GET  /api/playlist-tracks/playlist/{playlistId}`
//! - `GET  /api/favorite-tracks/user/{userId}`
//! - `GET  /api/files/tracks/{id}` (media), `GET /api/files/artwork/{kind}/{id}`

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{Album, Artist, FavoriteTrack, Playlist, PlaylistTrack, Track};

/// Which entity an artwork URL is served for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtworkKind {
    Track,
    Album,
    Artist,
}

impl ArtworkKind {
    fn path_segment(self) -> &'static str {
        match self {
            Self::Track => "tracks",
            Self::Album => "albums",
            Self::Artist => "artists",
        }
    }
}

/// Play-event payload recorded against a track.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayEventBody {
    user_id: i64,
    duration_seconds: u32,
    completed: bool,
}

/// Backend reads and writes consumed by the playback session.
///
/// Implement this trait to create mock backends for testing.
#[async_trait]
pub trait DataApi: Send + Sync {
    /// Fetch the full track catalog.
    async fn fetch_tracks(&self) -> Result<Vec<Track>>;

    /// Fetch a single track by id. Fails with [`Error::Resolution`] on 404.
    async fn fetch_track(&self, id: i64) -> Result<Track>;

    /// Fetch all artists.
    async fn fetch_artists(&self) -> Result<Vec<Artist>>;

    /// Fetch all albums.
    async fn fetch_albums(&self) -> Result<Vec<Album>>;

    /// Fetch a user's named playlists.
    async fn fetch_playlists(&self, user_id: i64) -> Result<Vec<Playlist>>;

    /// Fetch the membership rows of a named playlist.
    async fn fetch_playlist_tracks(&self, playlist_id: i64) -> Result<Vec<PlaylistTrack>>;

    /// Fetch a user's favorite-track rows.
    async fn fetch_favorite_tracks(&self, user_id: i64) -> Result<Vec<FavoriteTrack>>;

    /// Record a play event. Callers treat failures as best-effort.
    async fn record_play(
        &self,
        user_id: i64,
        track_id: i64,
        duration_seconds: u32,
        completed: bool,
    ) -> Result<()>;

    /// URL the backend serves a track's media file from.
    fn media_url(&self, track_id: i64) -> String;

    /// URL the backend serves artwork from, per owning entity.
    fn artwork_url(&self, kind: ArtworkKind, id: i64) -> String;
}

/// HTTP client for the API gateway.
pub struct DataClient {
    http: reqwest::Client,
    base_url: String,
}

impl DataClient {
    /// Create a new client against the given gateway base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: trim_base(base_url.into()),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http(response.error_for_status().unwrap_err()));
        }

        Ok(response.json::<T>().await?)
    }
}

fn trim_base(mut base: String) -> String {
    while base.ends_with('/') {
        base.pop();
    }
    base
}

#[async_trait]
impl DataApi for DataClient {
    async fn fetch_tracks(&self) -> Result<Vec<Track>> {
        self.get_json("/api/tracks").await
    }

    async fn fetch_track(&self, id: i64) -> Result<Track> {
        let url = format!("{}/api/tracks/{}", self.base_url, id);
        let response = self.http.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::Resolution(id));
        }
        if !response.status().is_success() {
            return Err(Error::Http(response.error_for_status().unwrap_err()));
        }

        Ok(response.json::<Track>().await?)
    }

    async fn fetch_artists(&self) -> Result<Vec<Artist>> {
        self.get_json("/api/artists").await
    }

    async fn fetch_albums(&self) -> Result<Vec<Album>> {
        self.get_json("/api/albums").await
    }

    async fn fetch_playlists(&self, user_id: i64) -> Result<Vec<Playlist>> {
        self.get_json(&format!("/api/playlists/user/{}", user_id)).await
    }

    async fn fetch_playlist_tracks(&self, playlist_id: i64) -> Result<Vec<PlaylistTrack>> {
        self.get_json(&format!("/api/playlist-tracks/playlist/{}", playlist_id))
            .await
    }

    async fn fetch_favorite_tracks(&self, user_id: i64) -> Result<Vec<FavoriteTrack>> {
        self.get_json(&format!("/api/favorite-tracks/user/{}", user_id))
            .await
    }

    async fn record_play(
        &self,
        user_id: i64,
        track_id: i64,
        duration_seconds: u32,
        completed: bool,
    ) -> Result<()> {
        let url = format!("{}/api/tracks/{}/play", self.base_url, track_id);
        let body = PlayEventBody {
            user_id,
            duration_seconds,
            completed,
        };

        let response = self.http.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(Error::Analytics(format!(
                "play event for track {} rejected: HTTP {}",
                track_id,
                response.status()
            )));
        }
        Ok(())
    }

    fn media_url(&self, track_id: i64) -> String {
        format!("{}/api/files/tracks/{}", self.base_url, track_id)
    }

    fn artwork_url(&self, kind: ArtworkKind, id: i64) -> String {
        format!(
            "{}/api/files/artwork/{}/{}",
            self.base_url,
            kind.path_segment(),
            id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_url() {
        let client = DataClient::new("http://localhost:8080");
        assert_eq!(
            client.media_url(17),
            "http://localhost:8080/api/files/tracks/17"
        );
    }

    #[test]
    fn test_artwork_urls_per_kind() {
        let client = DataClient::new("http://localhost:8080");
        assert_eq!(
            client.artwork_url(ArtworkKind::Track, 1),
            "http://localhost:8080/api/files/artwork/tracks/1"
        );
        assert_eq!(
            client.artwork_url(ArtworkKind::Album, 2),
            "http://localhost:8080/api/files/artwork/albums/2"
        );
        assert_eq!(
            client.artwork_url(ArtworkKind::Artist, 3),
            "http://localhost:8080/api/files/artwork/artists/3"
        );
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = DataClient::new("http://localhost:8080/");
        assert_eq!(
            client.media_url(1),
            "http://localhost:8080/api/files/tracks/1"
        );
    }
}
