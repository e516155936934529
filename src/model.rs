//! Core data models for the streaming catalog.
//!
//! Defines the primary entities served by the backend: [`Track`],
//! [`Artist`], [`Album`], and [`Playlist`], plus the join rows for
//! playlist membership and favorites. The backend owns these records;
//! the client holds read-only cached copies keyed by id, replaced
//! wholesale on refetch.
//!
//! Wire format is camelCase JSON as produced by the catalog and user
//! services behind the API gateway.

use serde::{Deserialize, Serialize};

/// A track in the streaming catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Backend id
    pub id: i64,
    /// Track title
    pub title: String,
    /// Owning artist id
    pub artist_id: Option<i64>,
    /// Album id (singles have none)
    pub album_id: Option<i64>,
    /// Genre label
    pub genre: Option<String>,
    /// Duration in seconds, from the backend's audio probe
    pub duration_seconds: Option<u32>,
    /// Media file reference; absent until a file has been uploaded
    pub file_path: Option<String>,
    /// Artwork reference (absolute URL or backend-relative path)
    pub artwork_path: Option<String>,
    /// All-time play count
    #[serde(default)]
    pub play_count_all: Option<u64>,
    /// Rolling 30-day play count
    #[serde(default)]
    pub play_count_month: Option<u64>,
    /// Rolling 7-day play count
    #[serde(default)]
    pub play_count_week: Option<u64>,
    /// Rolling 24-hour play count
    #[serde(default)]
    pub play_count_day: Option<u64>,
    /// Featured on the new-releases shelf
    #[serde(default)]
    pub is_new_release: bool,
}

impl Track {
    /// Whether the backend has a playable media file for this track.
    pub fn has_media(&self) -> bool {
        self.file_path.as_deref().is_some_and(|p| !p.trim().is_empty())
    }
}

/// An artist in the streaming catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    /// Backend id
    pub id: i64,
    /// Artist name
    pub name: String,
    /// Primary genre label
    pub genre: Option<String>,
    /// Artist image reference (absolute URL or backend-relative path)
    pub image_path: Option<String>,
}

/// An album in the streaming catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    /// Backend id
    pub id: i64,
    /// Album title
    pub title: String,
    /// Owning artist id
    pub artist_id: Option<i64>,
    /// Release year
    pub release_year: Option<i32>,
    /// Cover artwork reference (absolute URL or backend-relative path)
    pub artwork_path: Option<String>,
}

/// A user-owned named playlist.
///
/// Distinct from the session's ordered list: a playlist is a persisted
/// backend collection, while the session list is the ephemeral sequence
/// the transport is currently navigating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: i64,
    pub name: String,
    pub user_id: i64,
}

/// Playlist membership row from the user service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistTrack {
    pub playlist_id: i64,
    pub track_id: i64,
}

/// Favorite-track row from the user service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteTrack {
    pub user_id: i64,
    pub track_id: i64,
}
