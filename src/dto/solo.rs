use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::state::{
    game::{Difficulty, GameSettings, Genre, STAGE_COUNT, Song},
    session::SessionState,
};

/// Upper bound on the number of songs a single session may request.
pub const MAX_SESSION_SONGS: usize = 50;

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
/// Settings sent by the client to start a solo session.
pub struct StartSession {
    #[schema(value_type = String, example = "rock")]
    pub genre: Genre,
    #[schema(value_type = String, example = "easy")]
    pub difficulty: Difficulty,
    #[validate(range(min = 1, max = MAX_SESSION_SONGS))]
    pub count: usize,
}

impl From<StartSession> for GameSettings {
    fn from(value: StartSession) -> Self {
        Self {
            genre: value.genre,
            difficulty: value.difficulty,
            count: value.count,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from the solo WebSocket client.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SoloInboundMessage {
    /// Draw songs and start playing the first one.
    Start(StartSession),
    /// Play the current stage clip.
    Play,
    NextStage,
    NextSong,
    Answer { text: String },
    Surrender,
    /// Autocomplete request for the guess box.
    Suggest { text: String },
    /// Embedded player finished loading the cued track.
    PlayerReady,
    PlayerError { code: i32 },
    /// Raw player state code reported by the embedded player.
    PlayerState { state: i32 },
    /// Answer to a query issued through a [`PlayerCommand`].
    PlayerReply {
        request_id: u64,
        #[schema(value_type = Object)]
        value: Value,
    },
    #[serde(other)]
    Unknown,
}

impl SoloInboundMessage {
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// Commands the server issues to the client's embedded player.
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PlayerCommand {
    /// Load `track_id` without starting it.
    Cue { track_id: String },
    SeekTo { seconds: f64, allow_seek_ahead: bool },
    Play,
    Pause,
    /// Reply with the track length in seconds.
    GetDuration { request_id: u64 },
    /// Reply with the current player state code.
    GetPlayerState { request_id: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
/// Public view of the session. The current song is never included.
pub struct SessionSnapshot {
    pub game_started: bool,
    pub is_playing: bool,
    pub current_stage: u8,
    pub stage_count: u8,
    pub score: u32,
    pub time_left: u32,
    pub song_index: usize,
    pub song_count: usize,
    pub solved: bool,
}

impl From<&SessionState> for SessionSnapshot {
    fn from(state: &SessionState) -> Self {
        Self {
            game_started: state.game_started,
            is_playing: state.is_playing,
            current_stage: state.current_stage,
            stage_count: STAGE_COUNT,
            score: state.score,
            time_left: state.time_left,
            song_index: state.current_song_index,
            song_count: state.songs.len(),
            solved: state.solved,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SongHint {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
}

impl From<&Song> for SongHint {
    fn from(song: &Song) -> Self {
        Self {
            id: song.id,
            title: song.title.clone(),
            artist: song.artist.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// Messages pushed to the solo WebSocket client.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SoloOutboundMessage {
    Session(SessionSnapshot),
    Tick {
        time_left: u32,
    },
    /// The session started with fewer songs than requested.
    DrawWarning {
        requested: usize,
        available: usize,
    },
    Error {
        message: String,
    },
    AnswerResult {
        correct: bool,
        points: u32,
        score: u32,
    },
    /// Answer shown after a surrender.
    Revealed {
        song: SongHint,
    },
    Suggestions {
        songs: Vec<SongHint>,
    },
    /// The stage clip ended before a correct answer.
    TimeUp {
        stage: u8,
    },
    SessionFinished {
        score: u32,
        songs_played: usize,
    },
    PlayerCommand(PlayerCommand),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn start_message_parses_tags_case_insensitively() {
        let raw = r#"{"type":"start","genre":"Rock","difficulty":"EASY","count":5}"#;
        let SoloInboundMessage::Start(start) = SoloInboundMessage::from_json_str(raw).unwrap()
        else {
            panic!("expected start message");
        };
        assert_eq!(start.genre, Genre::Rock);
        assert_eq!(start.difficulty, Difficulty::Easy);
        assert!(start.validate().is_ok());
    }

    #[test]
    fn start_count_is_bounded() {
        let with_count = |count| StartSession {
            genre: Genre::Pop,
            difficulty: Difficulty::Hard,
            count,
        };
        assert!(with_count(MAX_SESSION_SONGS).validate().is_ok());
        assert!(with_count(MAX_SESSION_SONGS + 1).validate().is_err());
        assert!(with_count(0).validate().is_err());
    }

    #[test]
    fn unknown_messages_do_not_fail_parsing() {
        let msg = SoloInboundMessage::from_json_str(r#"{"type":"dance"}"#).unwrap();
        assert!(matches!(msg, SoloInboundMessage::Unknown));
    }

    #[test]
    fn player_commands_nest_under_the_message_type() {
        let msg = SoloOutboundMessage::PlayerCommand(PlayerCommand::SeekTo {
            seconds: 42.0,
            allow_seek_ahead: true,
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "player_command",
                "command": "seek_to",
                "seconds": 42.0,
                "allow_seek_ahead": true
            })
        );
    }
}
