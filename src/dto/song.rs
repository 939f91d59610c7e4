//! DTOs for the song library REST API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dao::models::SongEntity,
    dto::{
        format_system_time,
        validation::{validate_not_blank, validate_video_id},
    },
    state::game::{Difficulty, Genre},
};

/// Song as exposed by the library listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct SongResponse {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    /// Media reference handed to the embedded player.
    pub track_id: Option<String>,
    pub thumbnail: Option<String>,
    /// Genre tag as stored. May fall outside the known genres for legacy records.
    pub genre: String,
    pub difficulty: String,
    /// RFC 3339 timestamp of when the song was added.
    pub created_at: String,
}

impl From<SongEntity> for SongResponse {
    fn from(value: SongEntity) -> Self {
        let artist = value
            .artist
            .filter(|artist| !artist.trim().is_empty())
            .or(value.channel_title)
            .unwrap_or_default();
        Self {
            id: value.id,
            title: value.title,
            artist,
            track_id: value.track_id.or(value.video_id),
            thumbnail: value.thumbnail,
            genre: value.genre,
            difficulty: value.difficulty,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Import a video search result into the library.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateSongRequest {
    #[validate(custom(function = validate_video_id))]
    pub video_id: String,
    #[validate(custom(function = validate_not_blank))]
    pub title: String,
    /// Uploading channel, stored as the song's artist.
    #[serde(default)]
    pub channel_title: Option<String>,
    #[serde(default)]
    #[validate(url)]
    pub thumbnail: Option<String>,
    /// Defaults to `pop` when omitted.
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "rock")]
    pub genre: Option<Genre>,
    /// Defaults to `medium` when omitted.
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "hard")]
    pub difficulty: Option<Difficulty>,
}

/// Change the tags of a stored song. Omitted fields are left unchanged.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSongRequest {
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "metal")]
    pub genre: Option<Genre>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "easy")]
    pub difficulty: Option<Difficulty>,
}

impl Validate for UpdateSongRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.genre.is_none() && self.difficulty.is_none() {
            let mut err = ValidationError::new("empty_update");
            err.message = Some("At least one of `genre` or `difficulty` is required".into());
            errors.add("genre", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
