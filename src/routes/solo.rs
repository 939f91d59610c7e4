use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{services::solo_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/solo/ws",
    tag = "solo",
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a solo game session.
pub async fn solo_ws_handler(
    State(state): State<SharedState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| solo_service::handle_socket(state, socket))
}

/// Configure the solo WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/solo/ws", get(solo_ws_handler))
}
