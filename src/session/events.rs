//! Event synchronization between the media element and the session.
//!
//! Media lifecycle signals drive the session through an explicit
//! transition table: `(status, pending intent, signal)` maps to a next
//! status and a list of side effects. The table itself is pure - the
//! failure paths of every signal are checkable without a media element
//! in sight - and the async pump executes the effects against the
//! session's collaborators.
//!
//! Stale-load guard: ready/failed signals carry the load token they
//! answer. A signal whose token no longer matches the in-flight load
//! is dropped, so a slow superseded load can never clobber a faster
//! later selection.

use std::sync::Arc;
use std::time::Duration;

use super::state::{LoadIntent, PlaybackStatus};
use super::{track_duration, PlaybackSession};
use crate::media::{MediaSignal, SignalReceiver};

/// Side effects a transition asks the pump to perform.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Effect {
    /// Adopt the reported duration (falls back to track metadata).
    SetDuration(Option<Duration>),
    /// The pending load is ready: start audible playback.
    BeginPendingPlayback,
    /// The pending load is ready: seek silently to the saved position.
    RestoreSeek(Duration),
    /// Re-render progress indicators.
    Progress {
        position: Duration,
        duration: Option<Duration>,
    },
    /// Re-render every surface's transport state.
    Notify,
    /// Save a snapshot immediately (play/pause transition).
    PersistNow,
    /// Throttled snapshot save (position update).
    PersistThrottled,
    /// The current track played to its end.
    TrackEnded,
    /// Surface a user-visible load failure.
    ReportError(String),
    /// Put the session back on the track it had before the failed load.
    RevertToPrior,
}

/// Outcome of one signal against the transition table.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Transition {
    /// New status, when the signal changes it directly
    pub next: Option<PlaybackStatus>,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(effects: Vec<Effect>) -> Self {
        Self {
            next: None,
            effects,
        }
    }

    fn to(next: PlaybackStatus, effects: Vec<Effect>) -> Self {
        Self {
            next: Some(next),
            effects,
        }
    }
}

/// The transition table. Total over every (status, intent, signal)
/// combination; token staleness is filtered before consultation.
pub(crate) fn transition(
    status: PlaybackStatus,
    intent: Option<&LoadIntent>,
    signal: &MediaSignal,
) -> Transition {
    match signal {
        MediaSignal::Ready { duration, .. } => match intent {
            Some(LoadIntent::Play) => Transition::stay(vec![
                Effect::SetDuration(*duration),
                Effect::BeginPendingPlayback,
            ]),
            Some(LoadIntent::RestoreAt(position)) => Transition::to(
                PlaybackStatus::Paused,
                vec![
                    Effect::SetDuration(*duration),
                    Effect::RestoreSeek(*position),
                    Effect::Notify,
                ],
            ),
            // Ready with nothing pending: adopt the duration, nothing more.
            None => Transition::stay(vec![Effect::SetDuration(*duration)]),
        },

        MediaSignal::Position { position, duration } => Transition::stay(vec![
            Effect::Progress {
                position: *position,
                duration: *duration,
            },
            Effect::PersistThrottled,
        ]),

        MediaSignal::Started => Transition::to(
            PlaybackStatus::Playing,
            vec![Effect::Notify, Effect::PersistNow],
        ),

        MediaSignal::Paused => match status {
            // A pause racing a newer load must not mask the load.
            PlaybackStatus::Loading => Transition::stay(vec![Effect::PersistNow]),
            _ => Transition::to(
                PlaybackStatus::Paused,
                vec![Effect::Notify, Effect::PersistNow],
            ),
        },

        MediaSignal::Ended => {
            Transition::to(PlaybackStatus::Paused, vec![Effect::TrackEnded])
        }

        MediaSignal::Failed { message, .. } => Transition::stay(vec![
            Effect::ReportError(format!("Could not play this track: {message}")),
            Effect::RevertToPrior,
            Effect::Notify,
        ]),
    }
}

impl PlaybackSession {
    /// Feed one media signal through the transition table.
    pub(crate) async fn apply_signal(&self, signal: MediaSignal) {
        // Drop ready/failed answers for loads that were superseded.
        let intent = {
            let st = self.state().lock();
            match &signal {
                MediaSignal::Ready { token, .. } | MediaSignal::Failed { token, .. } => {
                    match &st.pending {
                        Some(pending) if pending.token == *token => Some(pending.intent.clone()),
                        _ => {
                            tracing::debug!("dropping stale media signal {signal:?}");
                            return;
                        }
                    }
                }
                _ => st.pending.as_ref().map(|p| p.intent.clone()),
            }
        };

        let Transition { next, effects } = transition(self.state().lock().status, intent.as_ref(), &signal);

        if let Some(next) = next {
            self.state().lock().status = next;
        }
        for effect in effects {
            self.run_effect(effect).await;
        }
    }

    async fn run_effect(&self, effect: Effect) {
        match effect {
            Effect::SetDuration(duration) => {
                let mut st = self.state().lock();
                let fallback = st.current.as_ref().map(track_duration);
                st.duration = duration.or(fallback).unwrap_or(st.duration);
            }

            Effect::BeginPendingPlayback => {
                self.state().lock().pending = None;
                self.media().play();
                self.record_play(false);
            }

            Effect::RestoreSeek(position) => {
                let target = {
                    let mut st = self.state().lock();
                    st.pending = None;
                    // Don't seek past the end of a shorter-than-saved file.
                    if !st.duration.is_zero() && position >= st.duration {
                        None
                    } else {
                        st.position = position;
                        Some(position)
                    }
                };
                if let Some(target) = target {
                    if !target.is_zero() {
                        self.media().seek(target);
                    }
                }
            }

            Effect::Progress { position, duration } => {
                let duration = {
                    let mut st = self.state().lock();
                    st.position = position;
                    if let Some(duration) = duration {
                        st.duration = duration;
                    }
                    st.duration
                };
                self.notify_progress(position, duration);
            }

            Effect::Notify => self.notify_now_playing(),

            Effect::PersistNow => self.save_now("transition"),

            Effect::PersistThrottled => self.save_throttled(),

            Effect::TrackEnded => self.handle_track_end().await,

            Effect::ReportError(message) => self.notify_error(&message),

            Effect::RevertToPrior => {
                let mut st = self.state().lock();
                match st.pending.take().and_then(|p| p.prior) {
                    Some(prior) => {
                        if prior.index < st.list.len() {
                            st.index = prior.index;
                        } else if !st.list.is_empty() {
                            st.index = 0;
                        }
                        st.current = Some(prior.track);
                        st.status = prior.status;
                    }
                    None => {
                        st.current = None;
                        st.index = 0;
                        st.status = PlaybackStatus::Stopped;
                    }
                }
                debug_assert!(st.index_valid());
            }
        }
    }
}

/// Drive the session from a media element's signal stream.
///
/// Runs until the element's sender side is dropped.
pub async fn run_event_pump(session: Arc<PlaybackSession>, mut signals: SignalReceiver) {
    while let Some(signal) = signals.recv().await {
        session.apply_signal(signal).await;
    }
}
