use tracing::{debug, warn};

use crate::{dto::search::VideoResult, error::ServiceError, state::SharedState};

/// Search the video catalog, serving repeated queries from the cache.
pub async fn search_videos(
    state: &SharedState,
    query: &str,
) -> Result<Vec<VideoResult>, ServiceError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    if let Some(hit) = state.search_cache().get(query) {
        debug!(query, results = hit.len(), "video search served from cache");
        return Ok(hit.into_iter().map(VideoResult::from).collect());
    }

    let Some(client) = state.video_search() else {
        return Err(ServiceError::External(
            "video search is not configured".into(),
        ));
    };

    let videos = client.search(query).await.map_err(|err| {
        warn!(query, error = %err, "video search failed");
        ServiceError::from(err)
    })?;
    state.search_cache().insert(query, videos.clone());
    debug!(query, results = videos.len(), "video search completed");

    Ok(videos.into_iter().map(VideoResult::from).collect())
}
