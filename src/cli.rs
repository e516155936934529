//! Command-line interface and interactive transport shell.
//!
//! The shell is the binary's built-in UI surface: each command maps
//! onto the session's public transport surface, exactly as a page's
//! click handlers would, and rendering happens through a registered
//! [`TransportSurface`] like any other view.

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::DataApi;
use crate::artwork::resolve_artwork;
use crate::error::{Result, ResultExt};
use crate::library::Library;
use crate::model::Track;
use crate::session::{
    format_duration, NowPlaying, PlaybackSession, PlaybackStatus, TransportSurface,
};

/// Tunestream CLI
#[derive(Parser)]
#[command(author, version, about = "Streaming music client", long_about = None)]
pub struct Cli {
    /// API gateway base URL (overrides the config file)
    #[arg(long, env = "TUNESTREAM_API_URL")]
    pub api_url: Option<String>,

    /// User id for favorites and play analytics (overrides the config file)
    #[arg(long, env = "TUNESTREAM_USER_ID")]
    pub user: Option<i64>,
}

/// One parsed shell command.
#[derive(Debug, Clone, PartialEq)]
enum ShellCommand {
    List,
    Play(i64),
    Toggle,
    Next,
    Previous,
    Seek(f64),
    Volume(f32),
    Mute,
    Shuffle,
    Repeat,
    Now,
    Favorites,
    Playlists,
    Playlist(i64),
    Album(i64),
    Artist(i64),
    Refresh,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_command(line: &str) -> ShellCommand {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return ShellCommand::Empty;
    };
    let arg = parts.next();

    let parsed_id = || arg.and_then(|a| a.parse::<i64>().ok());
    let parsed_fraction = || arg.and_then(|a| a.parse::<f64>().ok());

    match command {
        "list" | "ls" => ShellCommand::List,
        "play" | "p" => match parsed_id() {
            Some(id) => ShellCommand::Play(id),
            None => ShellCommand::Unknown("play needs a track id".to_string()),
        },
        "pause" | "toggle" | "space" => ShellCommand::Toggle,
        "next" | "n" => ShellCommand::Next,
        "prev" | "previous" => ShellCommand::Previous,
        "seek" => match parsed_fraction() {
            Some(f) => ShellCommand::Seek(f),
            None => ShellCommand::Unknown("seek needs a fraction between 0 and 1".to_string()),
        },
        "vol" | "volume" => match parsed_fraction() {
            Some(f) => ShellCommand::Volume(f as f32),
            None => ShellCommand::Unknown("vol needs a level between 0 and 1".to_string()),
        },
        "mute" => ShellCommand::Mute,
        "shuffle" => ShellCommand::Shuffle,
        "repeat" => ShellCommand::Repeat,
        "now" | "status" => ShellCommand::Now,
        "favorites" | "favs" => ShellCommand::Favorites,
        "playlists" => ShellCommand::Playlists,
        "playlist" => match parsed_id() {
            Some(id) => ShellCommand::Playlist(id),
            None => ShellCommand::Unknown("playlist needs an id".to_string()),
        },
        "album" => match parsed_id() {
            Some(id) => ShellCommand::Album(id),
            None => ShellCommand::Unknown("album needs an id".to_string()),
        },
        "artist" => match parsed_id() {
            Some(id) => ShellCommand::Artist(id),
            None => ShellCommand::Unknown("artist needs an id".to_string()),
        },
        "refresh" => ShellCommand::Refresh,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => ShellCommand::Unknown(format!("unknown command: {other}")),
    }
}

/// Surface that renders transport notifications as shell output.
pub struct ShellSurface {
    library: Arc<Library>,
}

impl ShellSurface {
    pub fn new(library: Arc<Library>) -> Self {
        Self { library }
    }

    fn title_of(&self, id: i64) -> String {
        self.library
            .track(id)
            .map(|t| t.title)
            .unwrap_or_else(|| format!("track {id}"))
    }
}

impl TransportSurface for ShellSurface {
    fn now_playing_changed(&self, now: &NowPlaying) {
        match now.track_id {
            Some(id) if now.is_playing => println!("  ▶ {}", self.title_of(id)),
            Some(id) => println!("  ⏸ {}", self.title_of(id)),
            None => {}
        }
    }

    fn flags_changed(&self, shuffle: bool, repeat: bool, volume: f32, muted: bool) {
        let mute_marker = if muted { " [muted]" } else { "" };
        println!(
            "  shuffle {} · repeat {} · volume {:.0}%{}",
            if shuffle { "on" } else { "off" },
            if repeat { "on" } else { "off" },
            volume * 100.0,
            mute_marker
        );
    }

    fn playback_error(&self, message: &str) {
        println!("  ✖ {message}");
    }

    fn prompt(&self, message: &str) {
        println!("  {message}");
    }
}

/// Load the bulk catalog into the shared caches.
pub async fn load_catalog(api: &dyn DataApi, library: &Library) -> Result<()> {
    let tracks = api
        .fetch_tracks()
        .await
        .with_context("fetching track catalog")?;
    tracing::info!("loaded {} tracks", tracks.len());
    library.set_tracks(tracks);

    match api.fetch_artists().await {
        Ok(artists) => library.set_artists(artists),
        Err(e) => tracing::warn!("artists not loaded: {e}"),
    }
    match api.fetch_albums().await {
        Ok(albums) => library.set_albums(albums),
        Err(e) => tracing::warn!("albums not loaded: {e}"),
    }
    Ok(())
}

/// Load the user's favorites view.
pub async fn load_favorites(api: &dyn DataApi, library: &Library, user_id: i64) -> Result<()> {
    let rows = api.fetch_favorite_tracks(user_id).await?;
    let favorites: Vec<Track> = rows
        .iter()
        .filter_map(|row| library.track(row.track_id))
        .collect();
    tracing::info!("loaded {} favorite tracks", favorites.len());
    library.set_favorites(favorites);
    Ok(())
}

/// Run the interactive transport shell until the user quits.
pub async fn run_shell(
    session: Arc<PlaybackSession>,
    library: Arc<Library>,
    api: Arc<dyn DataApi>,
    user_id: Option<i64>,
) -> anyhow::Result<()> {
    print_help();
    prompt();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            ShellCommand::List => cmd_list(&session, &library),
            ShellCommand::Play(id) => {
                // Failures are already reported through the surface.
                let _ = session.play_by_id(id).await;
            }
            ShellCommand::Toggle => session.toggle_play_pause(),
            ShellCommand::Next => {
                let _ = session.next().await;
            }
            ShellCommand::Previous => {
                let _ = session.previous().await;
            }
            ShellCommand::Seek(fraction) => session.seek(fraction),
            ShellCommand::Volume(level) => session.set_volume(level),
            ShellCommand::Mute => session.toggle_mute(),
            ShellCommand::Shuffle => session.toggle_shuffle(),
            ShellCommand::Repeat => session.toggle_repeat(),
            ShellCommand::Now => cmd_now(&session, &library, api.as_ref()),
            ShellCommand::Favorites => cmd_favorites(&session, &library, api.as_ref(), user_id).await,
            ShellCommand::Playlists => cmd_playlists(api.as_ref(), user_id).await,
            ShellCommand::Playlist(id) => cmd_playlist(&session, &library, api.as_ref(), id).await,
            ShellCommand::Album(id) => cmd_collection(&session, &library, CollectionKey::Album(id)).await,
            ShellCommand::Artist(id) => {
                cmd_collection(&session, &library, CollectionKey::Artist(id)).await
            }
            ShellCommand::Refresh => {
                if let Err(e) = load_catalog(api.as_ref(), &library).await {
                    println!("  ✖ refresh failed: {e}");
                }
            }
            ShellCommand::Help => print_help(),
            ShellCommand::Quit => break,
            ShellCommand::Empty => {}
            ShellCommand::Unknown(message) => println!("  {message}"),
        }
        prompt();
    }

    Ok(())
}

fn prompt() {
    print!("tunestream> ");
    let _ = std::io::stdout().flush();
}

fn print_help() {
    println!(
        "commands: list · play <id> · pause · next · prev · seek <0-1> · vol <0-1>\n          \
         mute · shuffle · repeat · now · favorites · playlists · playlist <id>\n          \
         album <id> · artist <id> · refresh · quit"
    );
}

/// Render the catalog with per-row transport icons.
///
/// Icons are re-derived on every render by comparing each row against
/// `current_track_info()` - rows never subscribe to events themselves.
fn cmd_list(session: &PlaybackSession, library: &Library) {
    let tracks = library.tracks();
    if tracks.is_empty() {
        println!("  catalog is empty (still loading, or try `refresh`)");
        return;
    }

    let now = session.current_track_info();
    for track in tracks {
        let icon = match now.track_id {
            Some(id) if id == track.id && now.is_playing => '▶',
            Some(id) if id == track.id => '⏸',
            _ => ' ',
        };
        let marker = if track.is_new_release { '*' } else { ' ' };
        let duration = track
            .duration_seconds
            .map(|s| format_duration(std::time::Duration::from_secs(u64::from(s))))
            .unwrap_or_else(|| "-:--".to_string());
        println!(
            "  {icon} [{:>4}]{marker}{:<40} {duration}",
            track.id, track.title
        );
    }
}

fn cmd_now(session: &PlaybackSession, library: &Library, api: &dyn DataApi) {
    let view = session.view();
    let Some(track) = view.current else {
        println!("  nothing selected");
        return;
    };

    let status = match view.status {
        PlaybackStatus::Playing => "playing",
        PlaybackStatus::Paused => "paused",
        PlaybackStatus::Loading => "loading",
        PlaybackStatus::Stopped => "stopped",
    };
    let artist = track
        .artist_id
        .and_then(|id| library.artist(id))
        .map(|a| a.name)
        .or(track.genre.clone())
        .unwrap_or_else(|| "unknown artist".to_string());

    println!("  {} — {} [{}]", track.title, artist, status);
    println!(
        "  {} / {} · track {}/{}",
        format_duration(view.position),
        format_duration(view.duration),
        view.index + 1,
        view.list_len
    );
    if let Some(plays) = track.play_count_all {
        println!("  {plays} plays all-time");
    }
    match resolve_artwork(&track, library, api) {
        Some(url) => println!("  artwork: {url}"),
        None => println!("  artwork: (none)"),
    }
}

async fn cmd_favorites(
    session: &PlaybackSession,
    library: &Library,
    api: &dyn DataApi,
    user_id: Option<i64>,
) {
    let Some(user_id) = user_id else {
        println!("  no user configured (pass --user or set session.user_id)");
        return;
    };
    if let Err(e) = load_favorites(api, library, user_id).await {
        println!("  ✖ favorites not loaded: {e}");
        return;
    }

    let favorites = library.favorites();
    if favorites.is_empty() {
        println!("  no favorites yet");
        return;
    }
    println!("  {} favorite tracks queued", favorites.len());
    library.set_displayed(favorites.clone());
    session.set_list(favorites, 0);
}

async fn cmd_playlists(api: &dyn DataApi, user_id: Option<i64>) {
    let Some(user_id) = user_id else {
        println!("  no user configured (pass --user or set session.user_id)");
        return;
    };
    match api.fetch_playlists(user_id).await {
        Ok(playlists) if playlists.is_empty() => println!("  no playlists yet"),
        Ok(playlists) => {
            for playlist in playlists {
                println!("  [{:>4}] {}", playlist.id, playlist.name);
            }
        }
        Err(e) => println!("  ✖ playlists not loaded: {e}"),
    }
}

async fn cmd_playlist(
    session: &PlaybackSession,
    library: &Library,
    api: &dyn DataApi,
    playlist_id: i64,
) {
    let rows = match api.fetch_playlist_tracks(playlist_id).await {
        Ok(rows) => rows,
        Err(e) => {
            println!("  ✖ playlist {playlist_id} not loaded: {e}");
            return;
        }
    };

    let tracks: Vec<Track> = rows
        .iter()
        .filter_map(|row| library.track(row.track_id))
        .collect();
    if tracks.is_empty() {
        println!("  playlist {playlist_id} has no playable tracks");
        return;
    }

    println!("  playing playlist {playlist_id} ({} tracks)", tracks.len());
    library.set_displayed(tracks.clone());
    let first = tracks[0].id;
    session.set_list(tracks, 0);
    let _ = session.play_by_id(first).await;
}

enum CollectionKey {
    Album(i64),
    Artist(i64),
}

async fn cmd_collection(session: &PlaybackSession, library: &Library, key: CollectionKey) {
    let (tracks, label): (Vec<Track>, String) = match key {
        CollectionKey::Album(id) => (
            library
                .tracks()
                .into_iter()
                .filter(|t| t.album_id == Some(id))
                .collect(),
            format!("album {id}"),
        ),
        CollectionKey::Artist(id) => (
            library
                .tracks()
                .into_iter()
                .filter(|t| t.artist_id == Some(id))
                .collect(),
            format!("artist {id}"),
        ),
    };

    if tracks.is_empty() {
        println!("  no tracks found for {label}");
        return;
    }

    println!("  playing {label} ({} tracks)", tracks.len());
    library.set_displayed(tracks.clone());
    let first = tracks[0].id;
    session.set_list(tracks, 0);
    let _ = session.play_by_id(first).await;
}
