//! Song library management backing the `/songs` and `/admin/songs` routes.

use std::{cmp::Reverse, time::SystemTime};

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::SongEntity,
    dto::song::{CreateSongRequest, SongResponse, UpdateSongRequest},
    error::ServiceError,
    state::{
        SharedState,
        game::{Difficulty, Genre},
    },
};

/// Every stored song, newest first.
pub async fn list_songs(state: &SharedState) -> Result<Vec<SongResponse>, ServiceError> {
    let store = state.require_catalog_store().await?;
    let mut songs = store.list_songs().await?;
    songs.sort_by_key(|song| Reverse(song.created_at));
    Ok(songs.into_iter().map(SongResponse::from).collect())
}

/// Store a video search result as a new song.
pub async fn create_song(
    state: &SharedState,
    request: CreateSongRequest,
) -> Result<SongResponse, ServiceError> {
    let store = state.require_catalog_store().await?;

    let title = request.title.trim().to_string();
    if title.is_empty() {
        return Err(ServiceError::InvalidInput("song title must not be blank".into()));
    }
    let channel_title = request
        .channel_title
        .map(|channel| channel.trim().to_string())
        .filter(|channel| !channel.is_empty());

    let entity = SongEntity {
        id: Uuid::new_v4(),
        title,
        artist: channel_title.clone(),
        channel_title,
        track_id: Some(request.video_id.clone()),
        video_id: Some(request.video_id),
        thumbnail: request.thumbnail,
        genre: request.genre.unwrap_or(Genre::Pop).as_str().to_string(),
        difficulty: request
            .difficulty
            .unwrap_or(Difficulty::Medium)
            .as_str()
            .to_string(),
        created_at: SystemTime::now(),
    };

    store.save_song(entity.clone()).await?;
    info!(id = %entity.id, title = %entity.title, "song added to the library");
    Ok(entity.into())
}

/// Change the genre and/or difficulty of a stored song.
pub async fn update_song(
    state: &SharedState,
    id: Uuid,
    request: UpdateSongRequest,
) -> Result<SongResponse, ServiceError> {
    if request.genre.is_none() && request.difficulty.is_none() {
        return Err(ServiceError::InvalidInput(
            "nothing to update: provide a genre or a difficulty".into(),
        ));
    }

    let store = state.require_catalog_store().await?;
    let Some(mut song) = store.find_song(id).await? else {
        return Err(ServiceError::NotFound(format!("song `{id}` not found")));
    };

    if let Some(genre) = request.genre {
        song.genre = genre.as_str().to_string();
    }
    if let Some(difficulty) = request.difficulty {
        song.difficulty = difficulty.as_str().to_string();
    }

    store.save_song(song.clone()).await?;
    debug!(%id, genre = %song.genre, difficulty = %song.difficulty, "song tags updated");
    Ok(song.into())
}

pub async fn delete_song(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_catalog_store().await?;
    if !store.delete_song(id).await? {
        return Err(ServiceError::NotFound(format!("song `{id}` not found")));
    }
    info!(%id, "song removed from the library");
    Ok(())
}
