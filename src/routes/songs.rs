use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::song::{CreateSongRequest, SongResponse, UpdateSongRequest},
    error::AppError,
    services::catalog_service,
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Public library listing.
pub fn router() -> Router<SharedState> {
    Router::new().route("/songs", get(list_songs))
}

/// Library management endpoints, guarded by the admin token.
pub fn admin_router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/songs", post(create_song))
        .route("/admin/songs/{id}", put(update_song).delete(delete_song))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// List every song in the library, newest first.
#[utoipa::path(
    get,
    path = "/songs",
    tag = "songs",
    responses(
        (status = 200, description = "Songs in the library", body = [SongResponse]),
        (status = 503, description = "Catalog unavailable")
    )
)]
pub async fn list_songs(
    State(state): State<SharedState>,
) -> Result<Json<Vec<SongResponse>>, AppError> {
    Ok(Json(catalog_service::list_songs(&state).await?))
}

/// Import a video as a new song.
#[utoipa::path(
    post,
    path = "/admin/songs",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    request_body = CreateSongRequest,
    responses(
        (status = 201, description = "Song created", body = SongResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Missing or invalid admin token")
    )
)]
pub async fn create_song(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateSongRequest>>,
) -> Result<(StatusCode, Json<SongResponse>), AppError> {
    let song = catalog_service::create_song(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(song)))
}

/// Change the genre and/or difficulty of a song.
#[utoipa::path(
    put,
    path = "/admin/songs/{id}",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Configured admin token"),
        ("id" = Uuid, Path, description = "Song identifier")
    ),
    request_body = UpdateSongRequest,
    responses(
        (status = 200, description = "Song updated", body = SongResponse),
        (status = 400, description = "Nothing to update"),
        (status = 404, description = "Unknown song")
    )
)]
pub async fn update_song(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<UpdateSongRequest>>,
) -> Result<Json<SongResponse>, AppError> {
    Ok(Json(catalog_service::update_song(&state, id, payload).await?))
}

/// Remove a song from the library.
#[utoipa::path(
    delete,
    path = "/admin/songs/{id}",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Configured admin token"),
        ("id" = Uuid, Path, description = "Song identifier")
    ),
    responses(
        (status = 204, description = "Song deleted"),
        (status = 404, description = "Unknown song")
    )
)]
pub async fn delete_song(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    catalog_service::delete_song(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    match state.admin_token() {
        Some(token) if token == provided => Ok(next.run(req).await),
        Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
        None => Err(AppError::Unauthorized(
            "admin routes are disabled: no admin token configured".into(),
        )),
    }
}
