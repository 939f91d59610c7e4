use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::models::SongEntity;

use super::error::CouchDaoError;

pub const SONG_PREFIX: &str = "song::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Minimal projection used to learn a document's current revision.
#[derive(Debug, Deserialize)]
pub struct RevisionOnly {
    #[serde(rename = "_rev")]
    pub rev: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchSongDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub song: SongBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongBody {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, rename = "channelTitle", skip_serializing_if = "Option::is_none")]
    pub channel_title: Option<String>,
    #[serde(default, rename = "youtubeId", skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
    #[serde(default, rename = "videoId", skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(rename = "createdAt")]
    pub created_at: SystemTime,
}

pub fn song_doc_id(id: Uuid) -> String {
    format!("{SONG_PREFIX}{id}")
}

impl From<(SongEntity, Option<String>)> for CouchSongDocument {
    fn from((song, rev): (SongEntity, Option<String>)) -> Self {
        Self {
            id: song_doc_id(song.id),
            rev,
            song: SongBody {
                title: song.title,
                artist: song.artist,
                channel_title: song.channel_title,
                track_id: song.track_id,
                video_id: song.video_id,
                thumbnail: song.thumbnail,
                genre: song.genre,
                difficulty: song.difficulty,
                created_at: song.created_at,
            },
        }
    }
}

impl TryFrom<CouchSongDocument> for SongEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchSongDocument) -> Result<Self, Self::Error> {
        let id = doc
            .id
            .strip_prefix(SONG_PREFIX)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| CouchDaoError::InvalidDocId {
                doc_id: doc.id.clone(),
            })?;
        let body = doc.song;
        Ok(Self {
            id,
            title: body.title,
            artist: body.artist,
            channel_title: body.channel_title,
            track_id: body.track_id,
            video_id: body.video_id,
            thumbnail: body.thumbnail,
            genre: body.genre,
            difficulty: body.difficulty,
            created_at: body.created_at,
        })
    }
}
