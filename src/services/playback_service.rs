//! Drives the embedded player so each stage plays a random window of the track
//! for exactly the stage duration, and reports the end of every window once.

use std::{sync::Arc, time::Duration};

use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    services::player::{MediaPlayer, PlayerEvent, PlayerState},
    state::{
        session::PlaybackRequest,
        state_machine::{LifecycleEvent, PlaybackStateMachine, PlayerPhase},
    },
};

/// Timing knobs of the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTuning {
    /// Delay between the first ready signal and the first command.
    pub settle_delay: Duration,
    /// Delay before checking that a pause was honoured.
    pub pause_recheck: Duration,
    /// Maximum number of pause re-checks after a window ends.
    pub max_pause_checks: u32,
    /// Delay before retrying a failed play.
    pub retry_delay: Duration,
    /// Play attempts allowed per window.
    pub max_attempts: u32,
    /// Window length used when the stage provides none.
    pub fallback_duration: Duration,
    /// Seconds kept free at the end of the track when choosing an offset.
    pub tail_margin_secs: u32,
}

impl Default for PlaybackTuning {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            pause_recheck: Duration::from_millis(500),
            max_pause_checks: 3,
            retry_delay: Duration::from_millis(500),
            max_attempts: 5,
            fallback_duration: Duration::from_secs(10),
            tail_margin_secs: 5,
        }
    }
}

/// Why a play window ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEndReason {
    /// The stage countdown ran out.
    Expired,
    /// The track reached its natural end.
    TrackEnded,
    /// The player reported an error code.
    PlayerError(i32),
    /// The caller stopped playback.
    Interrupted,
    /// Play kept failing and the retry budget ran out.
    Aborted,
}

/// Completion notice for a play window. Emitted at most once per window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowEnd {
    pub window_id: u64,
    pub track_id: String,
    pub reason: WindowEndReason,
}

#[derive(Debug, Clone)]
struct WindowSlot {
    id: u64,
    duration: Duration,
    attempts: u32,
    completed: bool,
}

#[derive(Debug, Clone, Copy)]
struct PauseCheck {
    at: Instant,
    remaining: u32,
}

/// Owner of the single embedded player for one solo session.
///
/// Callers only hand over [`PlaybackRequest`]s and player events; deadlines are
/// exposed through [`PlaybackSynchronizer::next_deadline`] and serviced with
/// [`PlaybackSynchronizer::on_timer`].
pub struct PlaybackSynchronizer {
    player: Arc<dyn MediaPlayer>,
    tuning: PlaybackTuning,
    machine: PlaybackStateMachine,
    request: Option<PlaybackRequest>,
    offset: Option<f64>,
    window: Option<WindowSlot>,
    next_window_id: u64,
    retry_at: Option<Instant>,
    pause_check: Option<PauseCheck>,
    rng: StdRng,
}

impl PlaybackSynchronizer {
    pub fn new(player: Arc<dyn MediaPlayer>, tuning: PlaybackTuning) -> Self {
        Self::with_rng(player, tuning, StdRng::from_os_rng())
    }

    /// Build a synchronizer with a caller-provided random source.
    pub fn with_rng(player: Arc<dyn MediaPlayer>, tuning: PlaybackTuning, rng: StdRng) -> Self {
        Self {
            player,
            tuning,
            machine: PlaybackStateMachine::new(),
            request: None,
            offset: None,
            window: None,
            next_window_id: 1,
            retry_at: None,
            pause_check: None,
            rng,
        }
    }

    pub fn phase(&self) -> PlayerPhase {
        self.machine.phase()
    }

    /// Start offset chosen for the current track, once seeked.
    pub fn offset(&self) -> Option<f64> {
        self.offset
    }

    /// Apply the latest playback inputs.
    pub async fn update(&mut self, next: Option<PlaybackRequest>) -> Option<WindowEnd> {
        if self.request == next {
            return None;
        }

        let same_track = matches!(
            (&self.request, &next),
            (Some(prev), Some(new)) if prev.track_id == new.track_id
        );

        if !same_track {
            // Stop the outgoing clip before its window is forgotten.
            let interrupted = if self.window_open() {
                self.request_pause().await;
                self.complete(WindowEndReason::Interrupted)
            } else {
                None
            };
            self.reset();
            self.request = next;
            let track = self.request.as_ref().map(|request| request.track_id.clone());
            if let Some(track_id) = track {
                debug!(track_id = %track_id, "cueing track");
                if let Err(err) = self.player.cue(&track_id).await {
                    warn!(error = %err, track_id = %track_id, "failed to cue track");
                }
                if self.request.as_ref().is_some_and(|request| request.is_playing) {
                    self.open_window();
                }
            }
            return interrupted;
        }

        let previous = self.request.take();
        let was_playing = previous.as_ref().is_some_and(|request| request.is_playing);
        let now_playing = next.as_ref().is_some_and(|request| request.is_playing);
        self.request = next;

        match (was_playing, now_playing) {
            (false, true) => {
                self.open_window();
                self.start_window().await
            }
            (true, false) => {
                self.retry_at = None;
                if !self.window_open() {
                    return None;
                }
                self.request_pause().await;
                let end = self.complete(WindowEndReason::Interrupted);
                self.schedule_pause_check();
                end
            }
            _ => None,
        }
    }

    /// React to a callback from the embedded player.
    pub async fn handle_event(&mut self, event: PlayerEvent) -> Option<WindowEnd> {
        match event {
            PlayerEvent::Ready => {
                if self.machine.phase() != PlayerPhase::Uninitialized {
                    debug!("ignoring repeated player ready signal");
                    return None;
                }
                let settle_until = Instant::now() + self.tuning.settle_delay;
                self.transition(LifecycleEvent::Loaded { settle_until });
                None
            }
            PlayerEvent::Error { code } => {
                warn!(code, "embedded player reported an error");
                self.retry_at = None;
                let end = self.complete(WindowEndReason::PlayerError(code));
                if self.machine.phase() != PlayerPhase::Uninitialized {
                    self.transition(LifecycleEvent::Failed);
                }
                end
            }
            PlayerEvent::StateChange(PlayerState::Playing) => {
                let wanted = self
                    .request
                    .as_ref()
                    .is_some_and(|request| request.is_playing);
                if !wanted {
                    info!("player started on its own, pausing");
                    self.request_pause().await;
                }
                None
            }
            PlayerEvent::StateChange(PlayerState::Ended) => {
                self.retry_at = None;
                self.complete(WindowEndReason::TrackEnded)
            }
            PlayerEvent::StateChange(_) => None,
        }
    }

    /// Earliest instant at which [`PlaybackSynchronizer::on_timer`] has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let phase_deadline = match self.machine.phase() {
            PlayerPhase::Settling { until } => Some(until),
            PlayerPhase::PlayingWindow { ends_at, .. } => Some(ends_at),
            _ => None,
        };

        [
            phase_deadline,
            self.retry_at,
            self.pause_check.map(|check| check.at),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Service every deadline that is due, returning the first window end raised.
    pub async fn on_timer(&mut self) -> Option<WindowEnd> {
        let now = Instant::now();
        let mut ended = None;

        if let PlayerPhase::Settling { until } = self.machine.phase()
            && until <= now
        {
            self.transition(LifecycleEvent::Settled);
            debug!("player settled");
            if self.window_pending() {
                ended = ended.or(self.start_window().await);
            }
        }

        if self.retry_at.is_some_and(|at| at <= now) {
            self.retry_at = None;
            ended = ended.or(self.start_window().await);
        }

        if let PlayerPhase::PlayingWindow { ends_at, .. } = self.machine.phase()
            && ends_at <= now
        {
            self.request_pause().await;
            ended = ended.or(self.complete(WindowEndReason::Expired));
            self.schedule_pause_check();
        }

        if let Some(check) = self.pause_check
            && check.at <= now
        {
            self.pause_check = None;
            self.verify_paused(check.remaining).await;
        }

        ended
    }

    fn reset(&mut self) {
        self.transition(LifecycleEvent::Reset);
        self.offset = None;
        self.window = None;
        self.retry_at = None;
        self.pause_check = None;
    }

    fn open_window(&mut self) {
        let duration = match self.request.as_ref().map(|request| request.duration_secs) {
            Some(secs) if secs > 0 => Duration::from_secs(u64::from(secs)),
            _ => self.tuning.fallback_duration,
        };
        let id = self.next_window_id;
        self.next_window_id += 1;
        self.window = Some(WindowSlot {
            id,
            duration,
            attempts: 0,
            completed: false,
        });
        self.retry_at = None;
    }

    fn window_open(&self) -> bool {
        self.window.as_ref().is_some_and(|slot| !slot.completed)
    }

    fn window_pending(&self) -> bool {
        self.window_open() && !matches!(self.machine.phase(), PlayerPhase::PlayingWindow { .. })
    }

    async fn start_window(&mut self) -> Option<WindowEnd> {
        if !self.window_pending() || !self.machine.phase().accepts_commands() {
            return None;
        }

        let (window_id, duration, attempt) = {
            let slot = self.window.as_mut()?;
            slot.attempts += 1;
            (slot.id, slot.duration, slot.attempts)
        };
        if attempt > self.tuning.max_attempts {
            warn!(window_id, attempts = attempt - 1, "giving up on play window");
            return self.complete(WindowEndReason::Aborted);
        }

        if self.offset.is_none() {
            let offset = self.choose_offset(duration).await;
            if let Err(err) = self.player.seek_to(offset, true).await {
                warn!(error = %err, window_id, attempt, "seek failed, retrying");
                self.retry_at = Some(Instant::now() + self.tuning.retry_delay);
                return None;
            }
            self.offset = Some(offset);
        }

        if let Err(err) = self.player.play().await {
            warn!(error = %err, window_id, attempt, "play failed, retrying");
            self.retry_at = Some(Instant::now() + self.tuning.retry_delay);
            return None;
        }

        let ends_at = Instant::now() + duration;
        self.transition(LifecycleEvent::WindowStarted { window_id, ends_at });
        debug!(window_id, ?duration, offset = ?self.offset, "play window started");
        None
    }

    async fn choose_offset(&mut self, window: Duration) -> f64 {
        let length = match self.player.duration().await {
            Ok(length) => length,
            Err(err) => {
                warn!(error = %err, "could not read track length, starting at 0");
                None
            }
        };

        let reserved = window.as_secs_f64() + f64::from(self.tuning.tail_margin_secs);
        match length {
            Some(length) if length > reserved => {
                self.rng.random_range(0.0..=(length - reserved)).floor()
            }
            _ => 0.0,
        }
    }

    fn complete(&mut self, reason: WindowEndReason) -> Option<WindowEnd> {
        let slot = self.window.as_mut().filter(|slot| !slot.completed)?;
        slot.completed = true;
        let window_id = slot.id;
        self.retry_at = None;

        if matches!(self.machine.phase(), PlayerPhase::PlayingWindow { .. }) {
            self.transition(LifecycleEvent::WindowClosed);
        }

        let track_id = self
            .request
            .as_ref()
            .map(|request| request.track_id.clone())
            .unwrap_or_default();
        info!(window_id, track_id = %track_id, ?reason, "play window ended");
        Some(WindowEnd {
            window_id,
            track_id,
            reason,
        })
    }

    async fn request_pause(&self) {
        if let Err(err) = self.player.pause().await {
            warn!(error = %err, "pause command failed");
        }
    }

    fn schedule_pause_check(&mut self) {
        if self.tuning.max_pause_checks == 0 {
            return;
        }
        self.pause_check = Some(PauseCheck {
            at: Instant::now() + self.tuning.pause_recheck,
            remaining: self.tuning.max_pause_checks,
        });
    }

    async fn verify_paused(&mut self, remaining: u32) {
        if self.request.as_ref().is_some_and(|request| request.is_playing) {
            return;
        }
        match self.player.player_state().await {
            Ok(PlayerState::Playing) => {
                info!(remaining, "player still playing after pause, pausing again");
                self.request_pause().await;
                if remaining > 1 {
                    self.pause_check = Some(PauseCheck {
                        at: Instant::now() + self.tuning.pause_recheck,
                        remaining: remaining - 1,
                    });
                }
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "could not confirm pause"),
        }
    }

    fn transition(&mut self, event: LifecycleEvent) {
        if let Err(err) = self.machine.apply(event) {
            debug!(error = %err, "ignored player lifecycle event");
        }
    }
}
