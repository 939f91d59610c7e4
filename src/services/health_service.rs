use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with a static health payload while logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_catalog_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "catalog health check failed");
            }
        }
        Err(_) => warn!("catalog unavailable (degraded mode)"),
    }

    let search_enabled = state.video_search().is_some();
    if state.is_degraded() {
        HealthResponse::degraded(search_enabled)
    } else {
        HealthResponse::ok(search_enabled)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::catalog_store::memory::MemoryCatalogStore, state::AppState,
    };

    #[tokio::test]
    async fn reports_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default(), None, None);
        let status = health_status(&state).await;
        assert_eq!(status.status, "degraded");
        assert!(!status.search_enabled);

        state
            .install_catalog_store(Arc::new(MemoryCatalogStore::new()))
            .await;
        assert_eq!(health_status(&state).await.status, "ok");
    }
}
