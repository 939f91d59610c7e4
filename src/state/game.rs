use std::{fmt, str::FromStr, time::SystemTime};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

/// Number of timed stages every song goes through.
pub const STAGE_COUNT: u8 = 5;

/// Clip duration and reward for a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDefinition {
    /// Length of the clip played during the stage, in seconds.
    pub time: u32,
    /// Points awarded for a correct guess during the stage.
    pub points: u32,
}

/// Stage table, ordered from the shortest clip (highest reward) to the longest.
pub const STAGES: [StageDefinition; STAGE_COUNT as usize] = [
    StageDefinition {
        time: 3,
        points: 100,
    },
    StageDefinition {
        time: 5,
        points: 80,
    },
    StageDefinition {
        time: 10,
        points: 60,
    },
    StageDefinition {
        time: 15,
        points: 40,
    },
    StageDefinition {
        time: 20,
        points: 20,
    },
];

/// Look up a stage by its 1-based index, clamping out-of-range values.
pub fn stage(index: u8) -> StageDefinition {
    let index = index.clamp(1, STAGE_COUNT);
    STAGES[usize::from(index - 1)]
}

/// Musical genre a song is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub enum Genre {
    Pop,
    Rock,
    Metal,
    Rap,
    Classical,
    Electronic,
}

/// How hard a song is expected to be to recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Raised when a free-text tag does not name a known genre or difficulty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownTag {
    /// Which tag family was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl Genre {
    /// Every genre, in the order offered to admins.
    pub const ALL: [Genre; 6] = [
        Genre::Pop,
        Genre::Rock,
        Genre::Metal,
        Genre::Rap,
        Genre::Classical,
        Genre::Electronic,
    ];

    /// Lowercase tag used in storage and on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Genre::Pop => "pop",
            Genre::Rock => "rock",
            Genre::Metal => "metal",
            Genre::Rap => "rap",
            Genre::Classical => "classical",
            Genre::Electronic => "electronic",
        }
    }
}

impl Difficulty {
    /// Every difficulty level, easiest first.
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Lowercase tag used in storage and on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Genre {
    type Err = UnknownTag;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        Genre::ALL
            .into_iter()
            .find(|genre| genre.as_str() == normalized)
            .ok_or_else(|| UnknownTag {
                kind: "genre",
                value: value.to_string(),
            })
    }
}

impl FromStr for Difficulty {
    type Err = UnknownTag;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        Difficulty::ALL
            .into_iter()
            .find(|difficulty| difficulty.as_str() == normalized)
            .ok_or_else(|| UnknownTag {
                kind: "difficulty",
                value: value.to_string(),
            })
    }
}

/// Runtime representation of a catalog song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    /// Stable identifier assigned by the catalog.
    pub id: Uuid,
    /// Song title as shown once revealed.
    pub title: String,
    /// Performing artist (falls back to the uploading channel).
    pub artist: String,
    /// Opaque reference understood by the embedded player (a video id).
    pub track_id: String,
    /// Genre tag.
    pub genre: Genre,
    /// Difficulty tag.
    pub difficulty: Difficulty,
    /// When the song was added to the library.
    pub created_at: SystemTime,
}

/// Parameters chosen by the player before a solo session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    /// Only songs of this genre are drawn.
    pub genre: Genre,
    /// Only songs of this difficulty are drawn.
    pub difficulty: Difficulty,
    /// Requested number of songs.
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_table_gets_longer_and_cheaper() {
        assert!(stage(1).time < stage(5).time);
        assert!(stage(1).points > stage(5).points);
        for pair in STAGES.windows(2) {
            assert!(pair[0].time < pair[1].time);
            assert!(pair[0].points > pair[1].points);
        }
    }

    #[test]
    fn stage_lookup_clamps_out_of_range_indices() {
        assert_eq!(stage(0), STAGES[0]);
        assert_eq!(stage(9), STAGES[4]);
    }

    #[test]
    fn tags_parse_case_insensitively() {
        assert_eq!(" Rock ".parse::<Genre>(), Ok(Genre::Rock));
        assert_eq!("EASY".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert!("polka".parse::<Genre>().is_err());
        assert!("impossible".parse::<Difficulty>().is_err());
    }

    #[test]
    fn tags_round_trip_through_json() {
        let json = serde_json::to_string(&Genre::Electronic).unwrap();
        assert_eq!(json, "\"electronic\"");
        let parsed: Difficulty = serde_json::from_str("\"Hard\"").unwrap();
        assert_eq!(parsed, Difficulty::Hard);
    }
}
