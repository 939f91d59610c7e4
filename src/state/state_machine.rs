use thiserror::Error;
use tokio::time::Instant;

/// Lifecycle phases of the embedded media player, as seen by the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerPhase {
    /// No readiness signal received for the current track.
    Uninitialized,
    /// The player reported ready; commands are held back until `until`.
    Settling {
        /// End of the settle delay.
        until: Instant,
    },
    /// Initialized and waiting for a play window.
    Ready,
    /// A play window is running and will be closed at `ends_at`.
    PlayingWindow {
        /// Identifier of the running window.
        window_id: u64,
        /// Deadline of the stage countdown.
        ends_at: Instant,
    },
    /// Initialized with no window running (after a window closed or a player error).
    Idle,
}

impl PlayerPhase {
    /// Whether player commands may be issued in this phase.
    pub fn accepts_commands(&self) -> bool {
        matches!(
            self,
            PlayerPhase::Ready | PlayerPhase::PlayingWindow { .. } | PlayerPhase::Idle
        )
    }
}

/// Events fed into the [`PlaybackStateMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The player reported readiness for the loaded track.
    Loaded {
        /// When the settle delay elapses.
        settle_until: Instant,
    },
    /// The settle delay elapsed.
    Settled,
    /// Play was issued and the countdown armed.
    WindowStarted {
        /// Identifier of the new window.
        window_id: u64,
        /// Countdown deadline.
        ends_at: Instant,
    },
    /// The running window ended, for whatever reason.
    WindowClosed,
    /// The player reported an error.
    Failed,
    /// The track changed; everything starts over.
    Reset,
}

/// Error returned when an event does not apply to the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: PlayerPhase,
    /// The event that cannot be applied from this phase.
    pub event: LifecycleEvent,
}

/// State machine replacing the loose ready/initialized/in-progress flags of the player integration.
#[derive(Debug, Clone)]
pub struct PlaybackStateMachine {
    phase: PlayerPhase,
    version: usize,
}

impl Default for PlaybackStateMachine {
    fn default() -> Self {
        Self {
            phase: PlayerPhase::Uninitialized,
            version: 0,
        }
    }
}

impl PlaybackStateMachine {
    /// Create a new state machine waiting for the player.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> PlayerPhase {
        self.phase
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Apply `event`, returning the new phase.
    pub fn apply(&mut self, event: LifecycleEvent) -> Result<PlayerPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: LifecycleEvent) -> Result<PlayerPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (_, LifecycleEvent::Reset) => PlayerPhase::Uninitialized,
            (PlayerPhase::Uninitialized, LifecycleEvent::Loaded { settle_until }) => {
                PlayerPhase::Settling {
                    until: settle_until,
                }
            }
            (PlayerPhase::Settling { .. }, LifecycleEvent::Settled) => PlayerPhase::Ready,
            (
                PlayerPhase::Ready | PlayerPhase::Idle,
                LifecycleEvent::WindowStarted { window_id, ends_at },
            ) => PlayerPhase::PlayingWindow { window_id, ends_at },
            (PlayerPhase::PlayingWindow { .. }, LifecycleEvent::WindowClosed) => PlayerPhase::Idle,
            (
                PlayerPhase::Settling { .. }
                | PlayerPhase::Ready
                | PlayerPhase::PlayingWindow { .. }
                | PlayerPhase::Idle,
                LifecycleEvent::Failed,
            ) => PlayerPhase::Idle,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn apply(sm: &mut PlaybackStateMachine, event: LifecycleEvent) -> PlayerPhase {
        sm.apply(event).unwrap()
    }

    fn ready(sm: &mut PlaybackStateMachine) {
        apply(
            sm,
            LifecycleEvent::Loaded {
                settle_until: Instant::now() + Duration::from_secs(1),
            },
        );
        apply(sm, LifecycleEvent::Settled);
    }

    #[test]
    fn initial_state_is_uninitialized() {
        let sm = PlaybackStateMachine::new();
        assert_eq!(sm.phase(), PlayerPhase::Uninitialized);
        assert!(!sm.phase().accepts_commands());
    }

    #[test]
    fn full_window_lifecycle() {
        let mut sm = PlaybackStateMachine::new();
        let settle_until = Instant::now() + Duration::from_secs(1);

        assert_eq!(
            apply(&mut sm, LifecycleEvent::Loaded { settle_until }),
            PlayerPhase::Settling {
                until: settle_until
            }
        );
        assert!(!sm.phase().accepts_commands());
        assert_eq!(apply(&mut sm, LifecycleEvent::Settled), PlayerPhase::Ready);

        let ends_at = Instant::now() + Duration::from_secs(3);
        assert_eq!(
            apply(
                &mut sm,
                LifecycleEvent::WindowStarted {
                    window_id: 1,
                    ends_at
                }
            ),
            PlayerPhase::PlayingWindow {
                window_id: 1,
                ends_at
            }
        );
        assert_eq!(apply(&mut sm, LifecycleEvent::WindowClosed), PlayerPhase::Idle);
        assert!(matches!(
            apply(
                &mut sm,
                LifecycleEvent::WindowStarted {
                    window_id: 2,
                    ends_at
                }
            ),
            PlayerPhase::PlayingWindow { window_id: 2, .. }
        ));
        assert_eq!(sm.version(), 5);
    }

    #[test]
    fn window_cannot_start_before_settling() {
        let mut sm = PlaybackStateMachine::new();
        let err = sm
            .apply(LifecycleEvent::WindowStarted {
                window_id: 1,
                ends_at: Instant::now(),
            })
            .unwrap_err();
        assert_eq!(err.from, PlayerPhase::Uninitialized);
        assert_eq!(sm.version(), 0);
    }

    #[test]
    fn closing_twice_is_rejected() {
        let mut sm = PlaybackStateMachine::new();
        ready(&mut sm);
        apply(
            &mut sm,
            LifecycleEvent::WindowStarted {
                window_id: 7,
                ends_at: Instant::now(),
            },
        );
        apply(&mut sm, LifecycleEvent::WindowClosed);

        let err = sm.apply(LifecycleEvent::WindowClosed).unwrap_err();
        assert_eq!(err.from, PlayerPhase::Idle);
        assert_eq!(err.event, LifecycleEvent::WindowClosed);
    }

    #[test]
    fn failure_leaves_player_idle() {
        let mut sm = PlaybackStateMachine::new();
        ready(&mut sm);
        apply(
            &mut sm,
            LifecycleEvent::WindowStarted {
                window_id: 1,
                ends_at: Instant::now(),
            },
        );
        assert_eq!(apply(&mut sm, LifecycleEvent::Failed), PlayerPhase::Idle);
        assert!(sm.apply(LifecycleEvent::Failed).is_ok());

        let mut fresh = PlaybackStateMachine::new();
        assert!(fresh.apply(LifecycleEvent::Failed).is_err());
    }

    #[test]
    fn reset_always_returns_to_uninitialized() {
        let mut sm = PlaybackStateMachine::new();
        ready(&mut sm);
        assert_eq!(apply(&mut sm, LifecycleEvent::Reset), PlayerPhase::Uninitialized);
        assert_eq!(apply(&mut sm, LifecycleEvent::Reset), PlayerPhase::Uninitialized);

        let err = sm.apply(LifecycleEvent::Settled).unwrap_err();
        assert_eq!(err.from, PlayerPhase::Uninitialized);
    }
}
