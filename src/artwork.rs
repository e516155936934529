//! Display artwork resolution with fallback.
//!
//! Resolves a display image URL for a track with proper priority:
//! 1. The track's own artwork reference
//! 2. The album's cover, if the album is cached with one
//! 3. The artist's image, if the artist is cached with one
//! 4. None (callers render a placeholder)
//!
//! A reference that is already an absolute external URL is used
//! verbatim; anything else becomes a backend file-serving URL built
//! from the owning entity's id.
//!
//! # Design
//!
//! Resolution is a pure function of the track and the shared caches -
//! no I/O, no dependence on which surface is asking. List rows, the
//! transport bar, and detail pages all derive the identical URL.

use crate::api::{ArtworkKind, DataApi};
use crate::library::Library;
use crate::model::Track;

/// Resolve a display image URL for `track`, or `None` for a placeholder.
pub fn resolve_artwork(track: &Track, library: &Library, api: &dyn DataApi) -> Option<String> {
    // Priority 1: the track's own artwork
    if let Some(reference) = non_empty(track.artwork_path.as_deref()) {
        return Some(reference_url(reference, api, ArtworkKind::Track, track.id));
    }

    // Priority 2: album cover
    if let Some(album) = track.album_id.and_then(|id| library.album(id)) {
        if let Some(reference) = non_empty(album.artwork_path.as_deref()) {
            return Some(reference_url(reference, api, ArtworkKind::Album, album.id));
        }
    }

    // Priority 3: artist image
    if let Some(artist) = track.artist_id.and_then(|id| library.artist(id)) {
        if let Some(reference) = non_empty(artist.image_path.as_deref()) {
            return Some(reference_url(reference, api, ArtworkKind::Artist, artist.id));
        }
    }

    None
}

fn non_empty(reference: Option<&str>) -> Option<&str> {
    reference.map(str::trim).filter(|r| !r.is_empty())
}

fn reference_url(reference: &str, api: &dyn DataApi, kind: ArtworkKind, id: i64) -> String {
    if is_absolute(reference) {
        reference.to_string()
    } else {
        api.artwork_url(kind, id)
    }
}

fn is_absolute(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}
