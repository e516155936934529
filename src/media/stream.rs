//! Streaming media element backed by rodio.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 Session (async tasks)                    │
//! │   load()/play()/pause()/seek() commands, position reads  │
//! └───────────────────────────┬──────────────────────────────┘
//!                             │ std mpsc commands
//!                             ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                Audio Thread (owns OutputStream)          │
//! │   Decodes fetched bytes into a Sink, reports position,   │
//! │   detects end-of-track, emits MediaSignals               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! `load` fetches the backend media URL into memory on the runtime,
//! then hands the bytes to the audio thread. The bytes are kept for
//! the lifetime of the track so seeks (including replay-after-end)
//! can rebuild the sink at any position.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::time::Duration;

use parking_lot::Mutex;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

use super::{LoadToken, MediaElement, MediaSignal, SignalSender};
use crate::error::{Error, Result};

/// How often the audio thread reports position while playing.
const TICK: Duration = Duration::from_millis(200);

/// Commands handed to the audio thread.
enum Cmd {
    Loaded {
        bytes: Arc<[u8]>,
        token: LoadToken,
    },
    Play,
    Pause,
    Seek(Duration),
    SetVolume(f32),
    SetMuted(bool),
    Shutdown,
}

/// Position/duration shared between the audio thread and readers.
#[derive(Default)]
struct Shared {
    position: Mutex<Duration>,
    duration: Mutex<Option<Duration>>,
}

/// A [`MediaElement`] that streams tracks from the backend.
pub struct StreamPlayer {
    cmd_tx: Sender<Cmd>,
    signals: SignalSender,
    shared: Arc<Shared>,
    http: reqwest::Client,
    runtime: tokio::runtime::Handle,
}

impl StreamPlayer {
    /// Create the player and spawn its audio thread.
    ///
    /// Fails if no audio output device can be opened. Must be called
    /// from within a tokio runtime (loads are spawned onto it).
    pub fn new(http: reqwest::Client, signals: SignalSender) -> Result<Self> {
        let (cmd_tx, cmd_rx) = channel();
        let (init_tx, init_rx) = channel();
        let shared = Arc::new(Shared::default());

        let thread_shared = Arc::clone(&shared);
        let thread_signals = signals.clone();
        std::thread::Builder::new()
            .name("tunestream-audio".to_string())
            .spawn(move || {
                // The output stream is not Send, so it must be opened
                // on the thread that will own it.
                let stream = match OutputStreamBuilder::open_default_stream() {
                    Ok(stream) => {
                        let _ = init_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = init_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                run_audio_thread(stream, cmd_rx, thread_shared, thread_signals);
            })?;

        match init_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::media_load(format!("audio output: {e}"))),
            Err(_) => return Err(Error::media_load("audio thread exited during startup")),
        }

        Ok(Self {
            cmd_tx,
            signals,
            shared,
            http,
            runtime: tokio::runtime::Handle::current(),
        })
    }

    fn send(&self, cmd: Cmd) {
        // A closed channel means the audio thread is gone; commands
        // become no-ops and the session hears nothing further.
        let _ = self.cmd_tx.send(cmd);
    }
}

impl MediaElement for StreamPlayer {
    fn load(&self, url: &str, token: LoadToken) {
        let http = self.http.clone();
        let url = url.to_string();
        let cmd_tx = self.cmd_tx.clone();
        let signals = self.signals.clone();

        self.runtime.spawn(async move {
            match fetch_bytes(&http, &url).await {
                Ok(bytes) => {
                    let _ = cmd_tx.send(Cmd::Loaded {
                        bytes: bytes.into(),
                        token,
                    });
                }
                Err(e) => {
                    tracing::warn!("media fetch failed for {url}: {e}");
                    let _ = signals.send(MediaSignal::Failed {
                        token,
                        message: e.to_string(),
                    });
                }
            }
        });
    }

    fn play(&self) {
        self.send(Cmd::Play);
    }

    fn pause(&self) {
        self.send(Cmd::Pause);
    }

    fn seek(&self, position: Duration) {
        self.send(Cmd::Seek(position));
    }

    fn set_volume(&self, volume: f32) {
        self.send(Cmd::SetVolume(volume.clamp(0.0, 1.0)));
    }

    fn set_muted(&self, muted: bool) {
        self.send(Cmd::SetMuted(muted));
    }

    fn position(&self) -> Duration {
        *self.shared.position.lock()
    }

    fn duration(&self) -> Option<Duration> {
        *self.shared.duration.lock()
    }
}

impl Drop for StreamPlayer {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(Cmd::Shutdown);
    }
}

async fn fetch_bytes(http: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = http.get(url).send().await?;
    if !response.status().is_success() {
        return Err(Error::media_load(format!(
            "HTTP {} fetching media",
            response.status()
        )));
    }
    Ok(response.bytes().await?.to_vec())
}

/// Audio thread state for the currently loaded track.
struct Loaded {
    sink: Sink,
    bytes: Arc<[u8]>,
    playing: bool,
}

fn run_audio_thread(
    mut stream: OutputStream,
    rx: Receiver<Cmd>,
    shared: Arc<Shared>,
    signals: SignalSender,
) {
    // rodio logs to stderr when the OutputStream drops; noisy for a client.
    stream.log_on_drop(false);

    let mut loaded: Option<Loaded> = None;
    let mut volume: f32 = 1.0;
    let mut muted = false;

    let effective = |volume: f32, muted: bool| if muted { 0.0 } else { volume };

    loop {
        match rx.recv_timeout(TICK) {
            Ok(Cmd::Loaded { bytes, token }) => {
                if let Some(old) = loaded.take() {
                    old.sink.stop();
                }
                match build_sink(&stream, &bytes, Duration::ZERO) {
                    Ok((sink, duration)) => {
                        sink.set_volume(effective(volume, muted));
                        *shared.position.lock() = Duration::ZERO;
                        *shared.duration.lock() = duration;
                        loaded = Some(Loaded {
                            sink,
                            bytes,
                            playing: false,
                        });
                        let _ = signals.send(MediaSignal::Ready { token, duration });
                    }
                    Err(message) => {
                        *shared.duration.lock() = None;
                        let _ = signals.send(MediaSignal::Failed { token, message });
                    }
                }
            }

            Ok(Cmd::Play) => {
                if let Some(current) = loaded.as_mut() {
                    // Replay after end-of-track needs a fresh sink.
                    if current.sink.empty() {
                        if let Ok((sink, _)) = build_sink(&stream, &current.bytes, Duration::ZERO) {
                            sink.set_volume(effective(volume, muted));
                            current.sink = sink;
                            *shared.position.lock() = Duration::ZERO;
                        }
                    }
                    current.sink.play();
                    current.playing = true;
                    let _ = signals.send(MediaSignal::Started);
                }
            }

            Ok(Cmd::Pause) => {
                if let Some(current) = loaded.as_mut() {
                    current.sink.pause();
                    current.playing = false;
                    let _ = signals.send(MediaSignal::Paused);
                }
            }

            Ok(Cmd::Seek(position)) => {
                if let Some(current) = loaded.as_mut() {
                    if current.sink.empty() || current.sink.try_seek(position).is_err() {
                        // Fall back to rebuilding the sink at the target.
                        if let Ok((sink, _)) = build_sink(&stream, &current.bytes, position) {
                            sink.set_volume(effective(volume, muted));
                            if current.playing {
                                sink.play();
                            }
                            current.sink = sink;
                        }
                    }
                    *shared.position.lock() = position;
                    let _ = signals.send(MediaSignal::Position {
                        position,
                        duration: *shared.duration.lock(),
                    });
                }
            }

            Ok(Cmd::SetVolume(v)) => {
                volume = v;
                if let Some(current) = loaded.as_ref() {
                    current.sink.set_volume(effective(volume, muted));
                }
            }

            Ok(Cmd::SetMuted(m)) => {
                muted = m;
                if let Some(current) = loaded.as_ref() {
                    current.sink.set_volume(effective(volume, muted));
                }
            }

            Ok(Cmd::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(current) = loaded.take() {
                    current.sink.stop();
                }
                break;
            }

            Err(RecvTimeoutError::Timeout) => {
                // Periodic position report and end-of-track detection.
                if let Some(current) = loaded.as_mut() {
                    if current.playing {
                        if current.sink.empty() {
                            current.playing = false;
                            let _ = signals.send(MediaSignal::Ended);
                        } else {
                            let position = current.sink.get_pos();
                            *shared.position.lock() = position;
                            let _ = signals.send(MediaSignal::Position {
                                position,
                                duration: *shared.duration.lock(),
                            });
                        }
                    }
                }
            }
        }
    }
}

/// Decode `bytes` into a paused sink positioned at `start_at`.
fn build_sink(
    stream: &OutputStream,
    bytes: &Arc<[u8]>,
    start_at: Duration,
) -> std::result::Result<(Sink, Option<Duration>), String> {
    let cursor = Cursor::new(Arc::clone(bytes));
    let decoder = Decoder::new(cursor).map_err(|e| format!("unsupported media: {e}"))?;
    let duration = decoder.total_duration();

    let sink = Sink::connect_new(stream.mixer());
    if start_at.is_zero() {
        sink.append(decoder);
    } else {
        sink.append(decoder.skip_duration(start_at));
    }
    sink.pause();
    Ok((sink, duration))
}
