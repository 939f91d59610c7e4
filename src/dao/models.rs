use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use thiserror::Error;
use uuid::Uuid;

use crate::state::game::{Difficulty, Genre, Song, UnknownTag};

/// Song record as persisted by the catalog backend.
///
/// Tags are kept as free text in storage; they are validated into
/// [`Genre`]/[`Difficulty`] when converted into a runtime [`Song`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SongEntity {
    /// Stable identifier for the song.
    pub id: Uuid,
    /// Title of the song (video title when imported from search).
    #[serde(default)]
    pub title: String,
    /// Performing artist.
    #[serde(default)]
    pub artist: Option<String>,
    /// Channel that uploaded the video, used when `artist` is missing.
    #[serde(default)]
    pub channel_title: Option<String>,
    /// Media reference handed to the embedded player.
    #[serde(default)]
    pub track_id: Option<String>,
    /// Video identifier recorded at import time, used when `track_id` is missing.
    #[serde(default)]
    pub video_id: Option<String>,
    /// Thumbnail URL captured from the video search.
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Genre tag.
    #[serde(default)]
    pub genre: String,
    /// Difficulty tag.
    #[serde(default)]
    pub difficulty: String,
    /// When the song was added.
    pub created_at: SystemTime,
}

/// Reasons a stored record cannot take part in a game.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidSongEntity {
    #[error("song `{0}` has no media reference")]
    MissingTrack(Uuid),
    #[error("song `{id}` has an invalid tag: {source}")]
    Tag {
        id: Uuid,
        #[source]
        source: UnknownTag,
    },
}

impl TryFrom<SongEntity> for Song {
    type Error = InvalidSongEntity;

    fn try_from(value: SongEntity) -> Result<Self, Self::Error> {
        let id = value.id;
        let genre = value
            .genre
            .parse::<Genre>()
            .map_err(|source| InvalidSongEntity::Tag { id, source })?;
        let difficulty = value
            .difficulty
            .parse::<Difficulty>()
            .map_err(|source| InvalidSongEntity::Tag { id, source })?;
        let track_id = value
            .track_id
            .filter(|track| !track.trim().is_empty())
            .or(value.video_id)
            .filter(|track| !track.trim().is_empty())
            .ok_or(InvalidSongEntity::MissingTrack(id))?;
        let artist = value
            .artist
            .filter(|artist| !artist.trim().is_empty())
            .or(value.channel_title)
            .unwrap_or_default();

        Ok(Self {
            id,
            title: value.title,
            artist,
            track_id,
            genre,
            difficulty,
            created_at: value.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> SongEntity {
        SongEntity {
            id: Uuid::new_v4(),
            title: "Bohemian Rhapsody".into(),
            artist: None,
            channel_title: Some("Queen Official".into()),
            track_id: None,
            video_id: Some("fJ9rUzIMcZQ".into()),
            thumbnail: None,
            genre: "Rock".into(),
            difficulty: "easy".into(),
            created_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn legacy_fields_fill_missing_artist_and_track() {
        let song = Song::try_from(entity()).unwrap();
        assert_eq!(song.artist, "Queen Official");
        assert_eq!(song.track_id, "fJ9rUzIMcZQ");
        assert_eq!(song.genre, Genre::Rock);
        assert_eq!(song.difficulty, Difficulty::Easy);
    }

    #[test]
    fn unknown_tags_are_rejected() {
        let mut raw = entity();
        raw.genre = "polka".into();
        assert!(matches!(
            Song::try_from(raw),
            Err(InvalidSongEntity::Tag { .. })
        ));
    }

    #[test]
    fn missing_media_reference_is_rejected() {
        let mut raw = entity();
        raw.video_id = None;
        assert!(matches!(
            Song::try_from(raw),
            Err(InvalidSongEntity::MissingTrack(_))
        ));
    }
}
