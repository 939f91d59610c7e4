use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod health;
pub mod search;
pub mod solo;
pub mod songs;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(songs::router())
        .merge(songs::admin_router(state.clone()))
        .merge(search::router())
        .merge(solo::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
