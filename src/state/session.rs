//! Staged solo session: song draw, stage timer, scoring and answer checks.

use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    dao::catalog_store::{CatalogStore, StorageError},
    state::{
        game::{Difficulty, GameSettings, Genre, STAGE_COUNT, Song, stage},
        matcher::rank_suggestions,
    },
};

/// Mutable state of one solo playthrough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Whether the current stage clip is running.
    pub is_playing: bool,
    /// Index into [`SessionState::songs`] of the song being guessed.
    pub current_song_index: usize,
    /// 1-based stage of the current song.
    pub current_stage: u8,
    pub score: u32,
    /// Seconds left on the stage timer.
    pub time_left: u32,
    pub game_started: bool,
    /// Songs drawn for this session, fixed once drawn.
    pub songs: Vec<Song>,
    /// Latest autocomplete suggestions.
    pub suggestions: Vec<Song>,
    /// The current song was already guessed correctly.
    pub solved: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            is_playing: false,
            current_song_index: 0,
            current_stage: 1,
            score: 0,
            time_left: 0,
            game_started: false,
            songs: Vec::new(),
            suggestions: Vec::new(),
            solved: false,
        }
    }
}

/// What the playback layer should be doing for the current stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackRequest {
    pub track_id: String,
    pub is_playing: bool,
    /// Clip length for the current stage.
    pub duration_secs: u32,
}

/// Successful draw result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// Every requested song was drawn.
    Full { count: usize },
    /// Fewer songs matched than requested; the session still starts.
    PartialFill { requested: usize, available: usize },
}

impl DrawOutcome {
    /// Number of songs in the new session.
    pub fn drawn(&self) -> usize {
        match *self {
            DrawOutcome::Full { count } => count,
            DrawOutcome::PartialFill { available, .. } => available,
        }
    }
}

/// Reasons a session could not be started.
#[derive(Debug, Error)]
pub enum DrawError {
    #[error("no songs match genre `{genre}` and difficulty `{difficulty}`")]
    EmptyCatalog { genre: Genre, difficulty: Difficulty },
    #[error(transparent)]
    Catalog(#[from] StorageError),
}

/// Effect of moving to the next song.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SongAdvance {
    /// Moved on to the song at `index`.
    Advanced { index: usize },
    /// The last song was done and the session ended.
    Finished,
    /// No session is running.
    Ignored,
}

/// Answer revealed by a surrender, together with where the session went next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surrender {
    pub revealed: Song,
    pub advance: SongAdvance,
}

/// Engine driving a [`SessionState`] through its operations.
///
/// Every operation is a no-op when no song is current; none of them panic.
#[derive(Debug, Default)]
pub struct SessionEngine {
    state: SessionState,
}

impl SessionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the session.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Song being guessed, if a session is running.
    pub fn current_song(&self) -> Option<&Song> {
        if !self.state.game_started {
            return None;
        }
        self.state.songs.get(self.state.current_song_index)
    }

    /// Draw a new set of songs and reset the session around them.
    ///
    /// On error the previous state is left untouched.
    pub async fn draw(
        &mut self,
        catalog: &dyn CatalogStore,
        settings: GameSettings,
    ) -> Result<DrawOutcome, DrawError> {
        let entities = catalog.list_songs().await?;
        let catalog_size = entities.len();

        let songs: Vec<Song> = entities
            .into_iter()
            .filter_map(|entity| match Song::try_from(entity) {
                Ok(song) => Some(song),
                Err(err) => {
                    warn!(error = %err, "skipping song unusable in a session");
                    None
                }
            })
            .collect();

        let (drawn, outcome) = select_songs(songs, settings)?;
        debug!(
            catalog_size,
            drawn = drawn.len(),
            genre = %settings.genre,
            difficulty = %settings.difficulty,
            "songs drawn"
        );

        self.state = SessionState {
            songs: drawn,
            game_started: true,
            current_stage: 1,
            time_left: stage(1).time,
            ..SessionState::default()
        };
        info!(songs = outcome.drawn(), "solo session started");

        Ok(outcome)
    }

    /// Start the current stage's clip and reset its timer.
    ///
    /// Returns `false` when nothing was started (no song, or already playing).
    pub fn start_playing(&mut self) -> bool {
        if self.current_song().is_none() || self.state.is_playing {
            return false;
        }
        self.state.is_playing = true;
        self.state.time_left = stage(self.state.current_stage).time;
        true
    }

    /// Whether the per-second timer should be running.
    pub fn is_ticking(&self) -> bool {
        self.state.is_playing && self.state.time_left > 0
    }

    /// One second elapsed. Returns the remaining time when the timer moved.
    pub fn tick(&mut self) -> Option<u32> {
        if !self.is_ticking() {
            return None;
        }
        self.state.time_left -= 1;
        Some(self.state.time_left)
    }

    /// Move to the next, longer stage of the current song.
    pub fn next_stage(&mut self) -> bool {
        if self.current_song().is_none() || self.state.current_stage >= STAGE_COUNT {
            return false;
        }
        self.state.current_stage += 1;
        self.state.is_playing = false;
        self.state.time_left = stage(self.state.current_stage).time;
        true
    }

    /// Move to the next song, or end the session after the last one.
    pub fn next_song(&mut self) -> SongAdvance {
        if self.current_song().is_none() {
            return SongAdvance::Ignored;
        }

        if self.state.current_song_index + 1 >= self.state.songs.len() {
            self.state.game_started = false;
            info!(score = self.state.score, "solo session finished");
            return SongAdvance::Finished;
        }

        self.state.current_song_index += 1;
        self.state.current_stage = 1;
        self.state.is_playing = false;
        self.state.time_left = stage(1).time;
        self.state.solved = false;
        self.state.suggestions.clear();
        SongAdvance::Advanced {
            index: self.state.current_song_index,
        }
    }

    /// Check a guess against the current song and award the stage points on a match.
    pub fn check_answer(&mut self, input: &str) -> bool {
        let Some(song) = self.current_song() else {
            return false;
        };
        let guess = input.trim().to_lowercase();
        if guess.is_empty() || self.state.solved {
            return false;
        }

        if !answer_matches(&guess, song) {
            return false;
        }

        let points = stage(self.state.current_stage).points;
        self.state.score += points;
        self.state.is_playing = false;
        self.state.solved = true;
        debug!(points, score = self.state.score, "correct answer");
        true
    }

    /// Give up on the current song: stop, reveal it, then advance.
    pub fn surrender(&mut self) -> Option<Surrender> {
        let revealed = self.current_song()?.clone();
        self.state.is_playing = false;
        let advance = self.next_song();
        Some(Surrender { revealed, advance })
    }

    /// Rank the drawn songs against `input` and store the result.
    pub fn search_suggestions(&mut self, input: &str) -> &[Song] {
        self.state.suggestions = rank_suggestions(input, &self.state.songs);
        &self.state.suggestions
    }

    /// Playback inputs derived from the current stage, if a song is current.
    pub fn playback_request(&self) -> Option<PlaybackRequest> {
        let song = self.current_song()?;
        Some(PlaybackRequest {
            track_id: song.track_id.clone(),
            is_playing: self.state.is_playing,
            duration_secs: stage(self.state.current_stage).time,
        })
    }

    /// The playback window for this stage is over.
    pub fn on_playback_complete(&mut self) {
        self.state.is_playing = false;
    }
}

fn answer_matches(guess: &str, song: &Song) -> bool {
    let title = song.title.trim().to_lowercase();
    let artist = song.artist.trim().to_lowercase();

    guess == title
        || guess == artist
        || format!("{artist} - {title}").contains(guess)
        || format!("{title} - {artist}").contains(guess)
}

fn select_songs(
    songs: Vec<Song>,
    settings: GameSettings,
) -> Result<(Vec<Song>, DrawOutcome), DrawError> {
    let mut matching: Vec<Song> = songs
        .into_iter()
        .filter(|song| song.genre == settings.genre && song.difficulty == settings.difficulty)
        .collect();

    if matching.is_empty() {
        return Err(DrawError::EmptyCatalog {
            genre: settings.genre,
            difficulty: settings.difficulty,
        });
    }

    let requested = settings.count.max(1);
    let available = matching.len();
    matching.shuffle(&mut rand::rng());
    matching.truncate(requested);

    let outcome = if available < requested {
        DrawOutcome::PartialFill {
            requested,
            available,
        }
    } else {
        DrawOutcome::Full { count: requested }
    };
    Ok((matching, outcome))
}
