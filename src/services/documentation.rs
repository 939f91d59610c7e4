use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Tune Trivia Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::songs::list_songs,
        crate::routes::songs::create_song,
        crate::routes::songs::update_song,
        crate::routes::songs::delete_song,
        crate::routes::search::search_videos,
        crate::routes::solo::solo_ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::song::SongResponse,
            crate::dto::song::CreateSongRequest,
            crate::dto::song::UpdateSongRequest,
            crate::dto::search::VideoResult,
            crate::dto::solo::StartSession,
            crate::dto::solo::SoloInboundMessage,
            crate::dto::solo::SoloOutboundMessage,
            crate::dto::solo::PlayerCommand,
            crate::dto::solo::SessionSnapshot,
            crate::dto::solo::SongHint,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "songs", description = "Song library"),
        (name = "admin", description = "Song library management (requires `X-Admin-Token`)"),
        (name = "search", description = "External video search"),
        (name = "solo", description = "WebSocket solo game sessions"),
    )
)]
pub struct ApiDoc;
