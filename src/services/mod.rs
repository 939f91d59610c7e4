/// Song library management.
pub mod catalog_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Play window synchronisation with the embedded player.
pub mod playback_service;
/// Embedded player command surface.
pub mod player;
/// Expiring cache for video search results.
pub mod search_cache;
/// Cached video search.
pub mod search_service;
/// Solo WebSocket session handling.
pub mod solo_service;
/// Catalog store supervision with reconnect backoff.
pub mod storage_supervisor;
