use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::search::{SearchQuery, VideoResult},
    error::AppError,
    services::search_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/search/videos",
    tag = "search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching videos", body = [VideoResult]),
        (status = 502, description = "Video search failed or is not configured")
    )
)]
/// Search the external video catalog for songs to import.
pub async fn search_videos(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<SearchQuery>>,
) -> Result<Json<Vec<VideoResult>>, AppError> {
    Ok(Json(search_service::search_videos(&state, &query.q).await?))
}

pub fn router() -> Router<SharedState> {
    Router::new().route("/search/videos", get(search_videos))
}
