//! Command surface of the embedded media player and its WebSocket-backed implementation.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::dto::solo::{PlayerCommand, SoloOutboundMessage};

pub type PlayerResult<T> = Result<T, PlayerError>;

/// Failures while driving the embedded player.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("player connection closed")]
    Disconnected,
    #[error("player did not answer `{query}` within {timeout:?}")]
    Timeout {
        query: &'static str,
        timeout: Duration,
    },
    #[error("player answered `{query}` with an unexpected value: {value}")]
    InvalidReply { query: &'static str, value: Value },
}

/// Playback state reported by the embedded player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
    Unknown(i32),
}

impl PlayerState {
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => PlayerState::Unstarted,
            0 => PlayerState::Ended,
            1 => PlayerState::Playing,
            2 => PlayerState::Paused,
            3 => PlayerState::Buffering,
            5 => PlayerState::Cued,
            other => PlayerState::Unknown(other),
        }
    }
}

/// Callbacks raised by the embedded player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    Ready,
    Error { code: i32 },
    StateChange(PlayerState),
}

/// Primitive commands understood by the embedded player.
pub trait MediaPlayer: Send + Sync {
    /// Load a track without playing it.
    fn cue(&self, track_id: &str) -> BoxFuture<'static, PlayerResult<()>>;
    fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) -> BoxFuture<'static, PlayerResult<()>>;
    fn play(&self) -> BoxFuture<'static, PlayerResult<()>>;
    fn pause(&self) -> BoxFuture<'static, PlayerResult<()>>;
    /// Track length in seconds, when the player knows it.
    fn duration(&self) -> BoxFuture<'static, PlayerResult<Option<f64>>>;
    fn player_state(&self) -> BoxFuture<'static, PlayerResult<PlayerState>>;
}

/// Player living in the browser on the other end of a solo WebSocket.
///
/// Commands are pushed on the connection's outbound queue; queries wait for a
/// `player_reply` carrying the same request id.
#[derive(Clone)]
pub struct RemotePlayer {
    outbound: mpsc::UnboundedSender<SoloOutboundMessage>,
    pending: Arc<DashMap<u64, oneshot::Sender<Value>>>,
    next_request: Arc<AtomicU64>,
    query_timeout: Duration,
}

impl RemotePlayer {
    pub fn new(outbound: mpsc::UnboundedSender<SoloOutboundMessage>, query_timeout: Duration) -> Self {
        Self {
            outbound,
            pending: Arc::new(DashMap::new()),
            next_request: Arc::new(AtomicU64::new(1)),
            query_timeout,
        }
    }

    /// Deliver a reply from the client to the query waiting on `request_id`.
    pub fn resolve(&self, request_id: u64, value: Value) {
        match self.pending.remove(&request_id) {
            Some((_, waiter)) => {
                let _ = waiter.send(value);
            }
            None => debug!(request_id, "discarding late or unknown player reply"),
        }
    }

    fn send(&self, command: PlayerCommand) -> PlayerResult<()> {
        self.outbound
            .send(SoloOutboundMessage::PlayerCommand(command))
            .map_err(|_| PlayerError::Disconnected)
    }

    fn command(&self, command: PlayerCommand) -> BoxFuture<'static, PlayerResult<()>> {
        let sent = self.send(command);
        Box::pin(async move { sent })
    }

    fn query(
        &self,
        query: &'static str,
        build: impl FnOnce(u64) -> PlayerCommand,
    ) -> BoxFuture<'static, PlayerResult<Value>> {
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id, tx);

        let sent = self.send(build(request_id));
        let pending = self.pending.clone();
        let timeout = self.query_timeout;
        Box::pin(async move {
            if let Err(err) = sent {
                pending.remove(&request_id);
                return Err(err);
            }
            match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(_)) => Err(PlayerError::Disconnected),
                Err(_) => {
                    pending.remove(&request_id);
                    Err(PlayerError::Timeout { query, timeout })
                }
            }
        })
    }
}

impl MediaPlayer for RemotePlayer {
    fn cue(&self, track_id: &str) -> BoxFuture<'static, PlayerResult<()>> {
        self.command(PlayerCommand::Cue {
            track_id: track_id.to_string(),
        })
    }

    fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) -> BoxFuture<'static, PlayerResult<()>> {
        self.command(PlayerCommand::SeekTo {
            seconds,
            allow_seek_ahead,
        })
    }

    fn play(&self) -> BoxFuture<'static, PlayerResult<()>> {
        self.command(PlayerCommand::Play)
    }

    fn pause(&self) -> BoxFuture<'static, PlayerResult<()>> {
        self.command(PlayerCommand::Pause)
    }

    fn duration(&self) -> BoxFuture<'static, PlayerResult<Option<f64>>> {
        let reply = self.query("get_duration", |request_id| PlayerCommand::GetDuration {
            request_id,
        });
        Box::pin(async move {
            match reply.await? {
                Value::Null => Ok(None),
                value => match value.as_f64() {
                    Some(seconds) if seconds > 0.0 => Ok(Some(seconds)),
                    Some(_) => Ok(None),
                    None => Err(PlayerError::InvalidReply {
                        query: "get_duration",
                        value,
                    }),
                },
            }
        })
    }

    fn player_state(&self) -> BoxFuture<'static, PlayerResult<PlayerState>> {
        let reply = self.query("get_player_state", |request_id| {
            PlayerCommand::GetPlayerState { request_id }
        });
        Box::pin(async move {
            let value = reply.await?;
            value
                .as_i64()
                .and_then(|code| i32::try_from(code).ok())
                .map(PlayerState::from_code)
                .ok_or(PlayerError::InvalidReply {
                    query: "get_player_state",
                    value,
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn remote() -> (RemotePlayer, mpsc::UnboundedReceiver<SoloOutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RemotePlayer::new(tx, Duration::from_secs(2)), rx)
    }

    fn request_id(message: SoloOutboundMessage) -> u64 {
        match message {
            SoloOutboundMessage::PlayerCommand(
                PlayerCommand::GetDuration { request_id }
                | PlayerCommand::GetPlayerState { request_id },
            ) => request_id,
            other => panic!("expected a player query, got {other:?}"),
        }
    }

    #[test]
    fn state_codes_map_to_states() {
        assert_eq!(PlayerState::from_code(1), PlayerState::Playing);
        assert_eq!(PlayerState::from_code(0), PlayerState::Ended);
        assert_eq!(PlayerState::from_code(2), PlayerState::Paused);
        assert_eq!(PlayerState::from_code(-1), PlayerState::Unstarted);
        assert_eq!(PlayerState::from_code(42), PlayerState::Unknown(42));
    }

    #[tokio::test]
    async fn queries_resolve_with_matching_reply() {
        let (player, mut rx) = remote();
        let pending = player.duration();
        let id = request_id(rx.recv().await.unwrap());

        player.resolve(id, json!(213.5));
        assert_eq!(pending.await.unwrap(), Some(213.5));
        assert!(player.pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_queries_time_out() {
        let (player, mut rx) = remote();
        let pending = player.player_state();
        let _ = rx.recv().await.unwrap();

        let err = pending.await.unwrap_err();
        assert!(matches!(err, PlayerError::Timeout { .. }));
        assert!(player.pending.is_empty());
    }

    #[tokio::test]
    async fn commands_fail_once_the_socket_is_gone() {
        let (player, rx) = remote();
        drop(rx);
        assert!(matches!(player.play().await, Err(PlayerError::Disconnected)));
        assert!(matches!(
            player.duration().await,
            Err(PlayerError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn malformed_state_reply_is_rejected() {
        let (player, mut rx) = remote();
        let pending = player.player_state();
        let id = request_id(rx.recv().await.unwrap());
        player.resolve(id, json!("playing"));
        assert!(matches!(
            pending.await,
            Err(PlayerError::InvalidReply { .. })
        ));
    }
}
