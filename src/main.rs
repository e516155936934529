//! Tunestream - a streaming music client.
//!
//! A headless client for a music-streaming REST backend: browse the
//! catalog, drive playback, and pick up where you left off. The heart
//! of the crate is the playback session - the single source of truth
//! for what is playing, from which ordered list, at what position -
//! which persists itself across runs and keeps every UI surface in
//! sync.

pub mod api;
pub mod artwork;
pub mod cli;
pub mod config;
pub mod error;
pub mod library;
pub mod media;
pub mod model;
pub mod session;
#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use api::{DataApi, DataClient};
use cli::{Cli, ShellSurface};
use library::Library;
use media::{signal_channel, MediaElement, StreamPlayer};
use session::{run_autosave, run_event_pump, PlaybackSession, SnapshotStore, TransportSurface};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("tunestream=info".parse().unwrap()))
        .init();

    let args = Cli::parse();

    let mut config = config::load();
    if let Some(api_url) = args.api_url {
        config.api.base_url = api_url;
    }
    if let Some(user) = args.user {
        config.session.user_id = Some(user);
    }

    let api = Arc::new(DataClient::new(config.api.base_url.clone()));
    let library = Arc::new(Library::new());

    let (signal_tx, signal_rx) = signal_channel();
    let media = Arc::new(
        StreamPlayer::new(reqwest::Client::new(), signal_tx)
            .context("audio output unavailable")?,
    );

    let store = SnapshotStore::default_location().unwrap_or_else(|| {
        SnapshotStore::new(std::env::temp_dir().join("tunestream").join(session::SNAPSHOT_FILE))
    });

    let session = Arc::new(PlaybackSession::new(
        Arc::clone(&library),
        Arc::clone(&api) as Arc<dyn DataApi>,
        Arc::clone(&media) as Arc<dyn MediaElement>,
        store,
        config.session.user_id,
        Duration::from_secs(config.session.snapshot_max_age_secs),
    ));
    session.register_surface(
        Arc::new(ShellSurface::new(Arc::clone(&library))) as Arc<dyn TransportSurface>
    );

    // Configured audio defaults; a restored snapshot overrides them.
    session.set_volume(config.audio.volume);
    if config.audio.muted {
        session.toggle_mute();
    }

    // The event pump and autosave run for the life of the process.
    tokio::spawn(run_event_pump(Arc::clone(&session), signal_rx));
    tokio::spawn(run_autosave(
        Arc::clone(&session),
        Duration::from_secs(config.session.autosave_secs),
    ));

    // Bulk catalog load in the background; restoration awaits it with
    // a bounded timeout rather than blocking startup.
    {
        let api = Arc::clone(&api);
        let library = Arc::clone(&library);
        let user_id = config.session.user_id;
        tokio::spawn(async move {
            if let Err(e) = cli::load_catalog(api.as_ref(), &library).await {
                tracing::error!("catalog load failed: {e}");
            }
            if let Some(user_id) = user_id {
                if let Err(e) = cli::load_favorites(api.as_ref(), &library, user_id).await {
                    tracing::warn!("favorites load failed: {e}");
                }
            }
        });
    }

    // Reconstruct the previous session without making a sound.
    session.restore().await;

    cli::run_shell(
        Arc::clone(&session),
        Arc::clone(&library),
        Arc::clone(&api) as Arc<dyn DataApi>,
        config.session.user_id,
    )
    .await?;

    // Page-unload analog: capture the final position for the next run.
    session.save_now("shutdown");

    // Keep the audio defaults for the next launch.
    let view = session.view();
    config.audio.volume = view.volume;
    config.audio.muted = view.muted;
    if let Err(e) = config::save(&config) {
        tracing::warn!("config not saved: {e}");
    }
    Ok(())
}
