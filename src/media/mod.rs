//! The media-primitive seam.
//!
//! The playback session drives an opaque media element: load a URL,
//! play, pause, seek, set volume. The element answers asynchronously
//! through [`MediaSignal`] lifecycle events on an unbounded channel -
//! the same shape as a host audio element's event stream.
//!
//! Every load carries a [`LoadToken`] drawn from the session's
//! generation counter. Ready/failed signals echo the token back, and
//! the session drops any signal whose token is no longer current, so a
//! slow load can never clobber a faster later selection.

mod stream;

pub use stream::StreamPlayer;

use std::time::Duration;

use tokio::sync::mpsc;

/// Generation token identifying one load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadToken(pub u64);

/// Lifecycle signals emitted by a media element.
#[derive(Debug, Clone)]
pub enum MediaSignal {
    /// Loading finished; the element can start playing. Duration is
    /// reported when the container declares one.
    Ready {
        token: LoadToken,
        duration: Option<Duration>,
    },
    /// Playback position advanced (high frequency).
    Position {
        position: Duration,
        duration: Option<Duration>,
    },
    /// Audible playback started or resumed.
    Started,
    /// Playback paused.
    Paused,
    /// The current track played to its end.
    Ended,
    /// The load failed (missing, corrupt, or unsupported media).
    Failed { token: LoadToken, message: String },
}

/// Sender half of a media element's signal channel.
pub type SignalSender = mpsc::UnboundedSender<MediaSignal>;

/// Receiver half of a media element's signal channel.
pub type SignalReceiver = mpsc::UnboundedReceiver<MediaSignal>;

/// Create the signal channel wiring a media element to the session.
pub fn signal_channel() -> (SignalSender, SignalReceiver) {
    mpsc::unbounded_channel()
}

/// An opaque playback primitive.
///
/// Commands are fire-and-forget; outcomes arrive as [`MediaSignal`]s.
/// Implementations must be safe to drive from any task.
pub trait MediaElement: Send + Sync {
    /// Begin loading a media URL. Emits `Ready` or `Failed` with the
    /// same token once the outcome is known. Loading a new URL discards
    /// whatever was loaded before.
    fn load(&self, url: &str, token: LoadToken);

    /// Start or resume playback of the loaded media.
    fn play(&self);

    /// Pause playback, preserving position.
    fn pause(&self);

    /// Jump to an absolute position.
    fn seek(&self, position: Duration);

    /// Set the output volume (0.0 - 1.0).
    fn set_volume(&self, volume: f32);

    /// Mute or unmute without touching the stored volume.
    fn set_muted(&self, muted: bool);

    /// Last known playback position.
    fn position(&self) -> Duration;

    /// Total duration of the loaded media, when known.
    fn duration(&self) -> Option<Duration>;
}
