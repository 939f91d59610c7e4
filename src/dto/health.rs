use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether video search is configured.
    pub search_enabled: bool,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(search_enabled: bool) -> Self {
        Self {
            status: "ok".to_string(),
            search_enabled,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(search_enabled: bool) -> Self {
        Self {
            status: "degraded".to_string(),
            search_enabled,
        }
    }
}
