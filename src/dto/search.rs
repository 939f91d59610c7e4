use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::dao::video_search::VideoEntity;

/// Query string of the video search endpoint.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Free text. A blank query yields no results.
    #[serde(default)]
    #[validate(length(max = 200))]
    pub q: String,
}

/// Video candidate that can be imported as a song.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct VideoResult {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub channel_title: String,
}

impl From<VideoEntity> for VideoResult {
    fn from(value: VideoEntity) -> Self {
        Self {
            id: value.id,
            title: value.title,
            thumbnail: value.thumbnail,
            channel_title: value.channel_title,
        }
    }
}
