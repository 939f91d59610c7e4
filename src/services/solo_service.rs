//! Solo game sessions over WebSocket.
//!
//! Each connection owns one [`SessionEngine`] and one [`PlaybackSynchronizer`]
//! driven from a single task. The reader half only parses frames: player
//! query replies are routed straight to the [`RemotePlayer`], everything else
//! is queued for the session task.

use std::{future, sync::Arc, time::Duration};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::{
    dto::solo::{SessionSnapshot, SongHint, SoloInboundMessage, SoloOutboundMessage, StartSession},
    services::{
        playback_service::{PlaybackSynchronizer, WindowEnd, WindowEndReason},
        player::{MediaPlayer, PlayerEvent, PlayerState, RemotePlayer},
    },
    state::{
        SharedState,
        game::stage,
        session::{DrawError, DrawOutcome, SessionEngine, SongAdvance},
    },
};

const TICK_INTERVAL: Duration = Duration::from_secs(1);
/// Shortest input that triggers autocomplete.
const MIN_SUGGEST_CHARS: usize = 2;

#[derive(Debug, Error)]
enum SessionError {
    /// Writer channel closed - the client is gone.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Handle the full lifecycle of a solo WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<SoloOutboundMessage>();

    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let payload = match serde_json::to_string(&message) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(error = %err, "failed to serialise solo message");
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let player = RemotePlayer::new(outbound_tx.clone(), state.config().player_query_timeout);
    let (command_tx, command_rx) = mpsc::unbounded_channel::<SoloInboundMessage>();
    let session = SoloSession::new(state, outbound_tx.clone(), Arc::new(player.clone()));
    let session_task = tokio::spawn(session.run(command_rx));

    info!("solo session connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match SoloInboundMessage::from_json_str(&text) {
                Ok(SoloInboundMessage::PlayerReply { request_id, value }) => {
                    player.resolve(request_id, value);
                }
                Ok(SoloInboundMessage::Unknown) => {
                    debug!(payload = %text, "ignoring unknown solo message");
                }
                Ok(command) => {
                    if command_tx.send(command).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "failed to parse solo message");
                    let _ = outbound_tx.send(SoloOutboundMessage::Error {
                        message: format!("invalid message: {err}"),
                    });
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "websocket receive error");
                break;
            }
        }
    }

    drop(command_tx);
    if let Err(err) = session_task.await {
        warn!(error = %err, "solo session task failed");
    }
    info!("solo session disconnected");
    finalize(writer_task, outbound_tx).await;
}

async fn finalize(
    writer_task: JoinHandle<()>,
    outbound_tx: mpsc::UnboundedSender<SoloOutboundMessage>,
) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

/// Session actor: game engine, playback synchronizer and the per-second tick.
struct SoloSession {
    state: SharedState,
    engine: SessionEngine,
    sync: PlaybackSynchronizer,
    outbound: mpsc::UnboundedSender<SoloOutboundMessage>,
    next_tick: Option<Instant>,
}

impl SoloSession {
    fn new(
        state: SharedState,
        outbound: mpsc::UnboundedSender<SoloOutboundMessage>,
        player: Arc<dyn MediaPlayer>,
    ) -> Self {
        let sync = PlaybackSynchronizer::new(player, state.config().playback);
        Self {
            state,
            engine: SessionEngine::new(),
            sync,
            outbound,
            next_tick: None,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SoloInboundMessage>) {
        loop {
            let deadline = self.next_deadline();
            let step = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = wait_until(deadline) => self.on_timer().await,
            };

            if let Err(err) = step {
                debug!(error = %err, "stopping solo session");
                break;
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        [self.next_tick, self.sync.next_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    async fn handle(&mut self, command: SoloInboundMessage) -> Result<(), SessionError> {
        match command {
            SoloInboundMessage::Start(settings) => self.start(settings).await,
            SoloInboundMessage::Play => {
                if self.engine.start_playing() {
                    self.next_tick = Some(Instant::now() + TICK_INTERVAL);
                    self.apply_playback().await?;
                    self.send_snapshot()
                } else {
                    debug!("play ignored: no song or already playing");
                    Ok(())
                }
            }
            SoloInboundMessage::NextStage => {
                if !self.engine.next_stage() {
                    return Ok(());
                }
                self.apply_playback().await?;
                self.send_snapshot()
            }
            SoloInboundMessage::NextSong => {
                let advance = self.engine.next_song();
                self.after_advance(advance).await
            }
            SoloInboundMessage::Answer { text } => {
                let points = stage(self.engine.state().current_stage).points;
                let correct = self.engine.check_answer(&text);
                self.send(SoloOutboundMessage::AnswerResult {
                    correct,
                    points: if correct { points } else { 0 },
                    score: self.engine.state().score,
                })?;
                if correct {
                    self.apply_playback().await?;
                    self.send_snapshot()?;
                }
                Ok(())
            }
            SoloInboundMessage::Surrender => {
                let Some(surrender) = self.engine.surrender() else {
                    return Ok(());
                };
                self.send(SoloOutboundMessage::Revealed {
                    song: SongHint::from(&surrender.revealed),
                })?;
                self.after_advance(surrender.advance).await
            }
            SoloInboundMessage::Suggest { text } => {
                let songs = if text.trim().chars().count() < MIN_SUGGEST_CHARS {
                    Vec::new()
                } else {
                    self.engine
                        .search_suggestions(&text)
                        .iter()
                        .map(SongHint::from)
                        .collect()
                };
                self.send(SoloOutboundMessage::Suggestions { songs })
            }
            SoloInboundMessage::PlayerReady => self.player_event(PlayerEvent::Ready).await,
            SoloInboundMessage::PlayerError { code } => {
                self.player_event(PlayerEvent::Error { code }).await
            }
            SoloInboundMessage::PlayerState { state } => {
                self.player_event(PlayerEvent::StateChange(PlayerState::from_code(state)))
                    .await
            }
            SoloInboundMessage::PlayerReply { .. } | SoloInboundMessage::Unknown => Ok(()),
        }
    }

    async fn start(&mut self, settings: StartSession) -> Result<(), SessionError> {
        if let Err(err) = settings.validate() {
            return self.send_error(format!("invalid session settings: {err}"));
        }

        let store = match self.state.require_catalog_store().await {
            Ok(store) => store,
            Err(err) => return self.send_error(err.to_string()),
        };

        match self.engine.draw(store.as_ref(), settings.into()).await {
            Ok(outcome) => {
                if let DrawOutcome::PartialFill {
                    requested,
                    available,
                } = outcome
                {
                    self.send(SoloOutboundMessage::DrawWarning {
                        requested,
                        available,
                    })?;
                }
            }
            Err(err @ DrawError::EmptyCatalog { .. }) => return self.send_error(err.to_string()),
            Err(DrawError::Catalog(err)) => {
                warn!(error = %err, "catalog unavailable while drawing songs");
                return self.send_error("song catalog is unavailable".into());
            }
        }

        // Release the clip the previous session left on the player.
        if let Some(end) = self.sync.update(None).await {
            self.on_window_end(end)?;
        }
        self.engine.start_playing();
        self.next_tick = Some(Instant::now() + TICK_INTERVAL);
        self.apply_playback().await?;
        self.send_snapshot()
    }

    async fn after_advance(&mut self, advance: SongAdvance) -> Result<(), SessionError> {
        match advance {
            SongAdvance::Advanced { index } => {
                debug!(index, "moved to next song");
                self.apply_playback().await?;
                self.send_snapshot()
            }
            SongAdvance::Finished => {
                self.apply_playback().await?;
                let state = self.engine.state();
                self.send(SoloOutboundMessage::SessionFinished {
                    score: state.score,
                    songs_played: state.songs.len(),
                })?;
                self.send_snapshot()
            }
            SongAdvance::Ignored => Ok(()),
        }
    }

    async fn player_event(&mut self, event: PlayerEvent) -> Result<(), SessionError> {
        if let Some(end) = self.sync.handle_event(event).await {
            self.on_window_end(end)?;
            self.apply_playback().await?;
        }
        Ok(())
    }

    async fn on_timer(&mut self) -> Result<(), SessionError> {
        let now = Instant::now();

        if let Some(due) = self.next_tick.filter(|at| *at <= now) {
            self.next_tick = None;
            if let Some(time_left) = self.engine.tick() {
                self.send(SoloOutboundMessage::Tick { time_left })?;
            }
            self.reschedule_tick(due);
        }

        if self.sync.next_deadline().is_some_and(|at| at <= now)
            && let Some(end) = self.sync.on_timer().await
        {
            self.on_window_end(end)?;
            self.apply_playback().await?;
        }

        Ok(())
    }

    /// Schedule the next tick one interval after the one just served.
    fn reschedule_tick(&mut self, served: Instant) {
        self.next_tick = if self.engine.is_ticking() {
            Some(served + TICK_INTERVAL)
        } else {
            None
        };
    }

    /// Hand the current playback inputs to the synchronizer until it settles.
    async fn apply_playback(&mut self) -> Result<(), SessionError> {
        loop {
            let request = self.engine.playback_request();
            match self.sync.update(request).await {
                Some(end) => self.on_window_end(end)?,
                None => break,
            }
        }
        if !self.engine.is_ticking() {
            self.next_tick = None;
        }
        Ok(())
    }

    fn on_window_end(&mut self, end: WindowEnd) -> Result<(), SessionError> {
        self.engine.on_playback_complete();
        self.next_tick = None;

        match end.reason {
            WindowEndReason::Interrupted => Ok(()),
            reason => {
                if reason == WindowEndReason::Aborted {
                    warn!(window_id = end.window_id, track_id = %end.track_id, "playback aborted");
                }
                self.send(SoloOutboundMessage::TimeUp {
                    stage: self.engine.state().current_stage,
                })?;
                self.send_snapshot()
            }
        }
    }

    fn send_snapshot(&self) -> Result<(), SessionError> {
        self.send(SoloOutboundMessage::Session(SessionSnapshot::from(
            self.engine.state(),
        )))
    }

    fn send_error(&self, message: String) -> Result<(), SessionError> {
        self.send(SoloOutboundMessage::Error { message })
    }

    fn send(&self, message: SoloOutboundMessage) -> Result<(), SessionError> {
        self.outbound
            .send(message)
            .map_err(|_| SessionError::ConnectionClosed)
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::SystemTime,
    };

    use futures::future::BoxFuture;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{catalog_store::memory::MemoryCatalogStore, models::SongEntity},
        dto::solo::PlayerCommand,
        services::player::PlayerResult,
        state::{
            AppState,
            game::{Difficulty, Genre},
        },
    };

    /// Player that accepts every command and reports a three minute track.
    #[derive(Default)]
    struct SilentPlayer {
        pauses: AtomicUsize,
        /// How long the track length query takes to answer.
        length_delay: Duration,
    }

    impl MediaPlayer for SilentPlayer {
        fn cue(&self, _: &str) -> BoxFuture<'static, PlayerResult<()>> {
            Box::pin(async { Ok(()) })
        }
        fn seek_to(&self, _: f64, _: bool) -> BoxFuture<'static, PlayerResult<()>> {
            Box::pin(async { Ok(()) })
        }
        fn play(&self) -> BoxFuture<'static, PlayerResult<()>> {
            Box::pin(async { Ok(()) })
        }
        fn pause(&self) -> BoxFuture<'static, PlayerResult<()>> {
            self.pauses.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }
        fn duration(&self) -> BoxFuture<'static, PlayerResult<Option<f64>>> {
            let delay = self.length_delay;
            Box::pin(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(Some(180.0))
            })
        }
        fn player_state(&self) -> BoxFuture<'static, PlayerResult<PlayerState>> {
            Box::pin(async { Ok(PlayerState::Paused) })
        }
    }

    fn song(title: &str, artist: &str, genre: &str) -> SongEntity {
        SongEntity {
            id: Uuid::new_v4(),
            title: title.into(),
            artist: Some(artist.into()),
            channel_title: None,
            track_id: Some(format!("track-{title}")),
            video_id: None,
            thumbnail: None,
            genre: genre.into(),
            difficulty: "easy".into(),
            created_at: SystemTime::now(),
        }
    }

    async fn session_with(
        songs: Vec<SongEntity>,
    ) -> (SoloSession, mpsc::UnboundedReceiver<SoloOutboundMessage>) {
        session_with_player(songs, Arc::new(SilentPlayer::default())).await
    }

    async fn session_with_player(
        songs: Vec<SongEntity>,
        player: Arc<SilentPlayer>,
    ) -> (SoloSession, mpsc::UnboundedReceiver<SoloOutboundMessage>) {
        let state = AppState::new(AppConfig::default(), None, None);
        state
            .install_catalog_store(Arc::new(MemoryCatalogStore::with_songs(songs)))
            .await;
        let (tx, rx) = mpsc::unbounded_channel();
        (SoloSession::new(state, tx, player), rx)
    }

    fn start(count: usize) -> SoloInboundMessage {
        SoloInboundMessage::Start(StartSession {
            genre: Genre::Rock,
            difficulty: Difficulty::Easy,
            count,
        })
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SoloOutboundMessage>) -> Vec<SoloOutboundMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn last_snapshot(messages: &[SoloOutboundMessage]) -> SessionSnapshot {
        messages
            .iter()
            .rev()
            .find_map(|message| match message {
                SoloOutboundMessage::Session(snapshot) => Some(snapshot.clone()),
                _ => None,
            })
            .expect("no snapshot sent")
    }

    #[tokio::test(start_paused = true)]
    async fn empty_catalog_reports_an_error() {
        let (mut session, mut rx) = session_with(vec![song("Paranoid", "Black Sabbath", "metal")]).await;

        session.handle(start(5)).await.unwrap();

        let messages = drain(&mut rx);
        assert!(matches!(messages.as_slice(), [SoloOutboundMessage::Error { .. }]));
        assert!(!session.engine.state().game_started);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_draw_warns_and_starts_playing() {
        let (mut session, mut rx) = session_with(vec![
            song("Bohemian Rhapsody", "Queen", "rock"),
            song("Hotel California", "Eagles", "rock"),
        ])
        .await;

        session.handle(start(5)).await.unwrap();

        let messages = drain(&mut rx);
        assert_eq!(
            messages[0],
            SoloOutboundMessage::DrawWarning {
                requested: 5,
                available: 2
            }
        );
        let snapshot = last_snapshot(&messages);
        assert!(snapshot.game_started);
        assert!(snapshot.is_playing);
        assert_eq!(snapshot.song_count, 2);
        assert_eq!(snapshot.time_left, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn correct_answer_awards_stage_points_once() {
        let (mut session, mut rx) =
            session_with(vec![song("Bohemian Rhapsody", "Queen", "rock")]).await;
        session.handle(start(1)).await.unwrap();
        drain(&mut rx);

        session
            .handle(SoloInboundMessage::Answer {
                text: "queen".into(),
            })
            .await
            .unwrap();
        session
            .handle(SoloInboundMessage::Answer {
                text: "Bohemian Rhapsody".into(),
            })
            .await
            .unwrap();

        let results: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|message| matches!(message, SoloOutboundMessage::AnswerResult { .. }))
            .collect();
        assert_eq!(
            results,
            [
                SoloOutboundMessage::AnswerResult {
                    correct: true,
                    points: 100,
                    score: 100
                },
                SoloOutboundMessage::AnswerResult {
                    correct: false,
                    points: 0,
                    score: 100
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn short_suggestion_inputs_return_nothing() {
        let (mut session, mut rx) =
            session_with(vec![song("Bohemian Rhapsody", "Queen", "rock")]).await;
        session.handle(start(1)).await.unwrap();
        drain(&mut rx);

        session
            .handle(SoloInboundMessage::Suggest { text: " q ".into() })
            .await
            .unwrap();
        session
            .handle(SoloInboundMessage::Suggest {
                text: "bohemian".into(),
            })
            .await
            .unwrap();

        let messages = drain(&mut rx);
        assert_eq!(
            messages[0],
            SoloOutboundMessage::Suggestions { songs: Vec::new() }
        );
        let SoloOutboundMessage::Suggestions { songs } = &messages[1] else {
            panic!("expected suggestions, got {:?}", messages[1]);
        };
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "Bohemian Rhapsody");
    }

    #[tokio::test(start_paused = true)]
    async fn surrender_on_last_song_finishes_the_session() {
        let (mut session, mut rx) =
            session_with(vec![song("Bohemian Rhapsody", "Queen", "rock")]).await;
        session.handle(start(1)).await.unwrap();
        drain(&mut rx);

        session.handle(SoloInboundMessage::Surrender).await.unwrap();

        let messages = drain(&mut rx);
        assert!(matches!(
            &messages[0],
            SoloOutboundMessage::Revealed { song } if song.title == "Bohemian Rhapsody"
        ));
        assert!(messages.contains(&SoloOutboundMessage::SessionFinished {
            score: 0,
            songs_played: 1
        }));
        assert!(!last_snapshot(&messages).game_started);
    }

    #[tokio::test(start_paused = true)]
    async fn stage_clip_times_out_after_its_duration() {
        let (session, mut rx) =
            session_with(vec![song("Bohemian Rhapsody", "Queen", "rock")]).await;
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(session.run(command_rx));

        command_tx.send(start(1)).unwrap();
        command_tx.send(SoloInboundMessage::PlayerReady).unwrap();
        // settle delay (1s) + stage one clip (3s)
        tokio::time::sleep(Duration::from_millis(4_500)).await;

        let messages = drain(&mut rx);
        assert!(messages.contains(&SoloOutboundMessage::TimeUp { stage: 1 }));
        assert!(messages.contains(&SoloOutboundMessage::Tick { time_left: 0 }));
        assert!(!last_snapshot(&messages).is_playing);

        drop(command_tx);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn slow_length_query_does_not_delay_the_countdown() {
        let player = Arc::new(SilentPlayer {
            length_delay: Duration::from_secs(2),
            ..SilentPlayer::default()
        });
        let (session, mut rx) =
            session_with_player(vec![song("Bohemian Rhapsody", "Queen", "rock")], player).await;
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(session.run(command_rx));

        command_tx.send(start(1)).unwrap();
        command_tx.send(SoloInboundMessage::PlayerReady).unwrap();
        // The clip starts at 3s, after the length query held the task from 1s to 3s.
        tokio::time::sleep(Duration::from_millis(3_050)).await;

        let ticks: Vec<u32> = drain(&mut rx)
            .into_iter()
            .filter_map(|message| match message {
                SoloOutboundMessage::Tick { time_left } => Some(time_left),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec![2, 1, 0]);

        drop(command_tx);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_the_last_song_mid_clip_pauses_once_without_time_up() {
        let player = Arc::new(SilentPlayer::default());
        let (session, mut rx) = session_with_player(
            vec![song("Bohemian Rhapsody", "Queen", "rock")],
            player.clone(),
        )
        .await;
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(session.run(command_rx));

        command_tx.send(start(1)).unwrap();
        command_tx.send(SoloInboundMessage::PlayerReady).unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(player.pauses.load(Ordering::SeqCst), 0);

        command_tx.send(SoloInboundMessage::NextSong).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let messages = drain(&mut rx);
        assert!(
            messages
                .iter()
                .any(|message| matches!(message, SoloOutboundMessage::SessionFinished { .. }))
        );
        assert!(
            !messages
                .iter()
                .any(|message| matches!(message, SoloOutboundMessage::TimeUp { .. }))
        );
        assert_eq!(player.pauses.load(Ordering::SeqCst), 1);

        drop(command_tx);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn remote_player_commands_flow_to_the_client() {
        let state = AppState::new(AppConfig::default(), None, None);
        state
            .install_catalog_store(Arc::new(MemoryCatalogStore::with_songs([song(
                "Bohemian Rhapsody",
                "Queen",
                "rock",
            )])))
            .await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let player = RemotePlayer::new(tx.clone(), Duration::from_secs(2));
        let mut session = SoloSession::new(state, tx, Arc::new(player));

        session.handle(start(1)).await.unwrap();

        let messages = drain(&mut rx);
        assert!(messages.contains(&SoloOutboundMessage::PlayerCommand(PlayerCommand::Cue {
            track_id: "track-Bohemian Rhapsody".into()
        })));
    }
}
