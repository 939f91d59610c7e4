pub mod game;
pub mod matcher;
pub mod session;
pub mod state_machine;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::{
        catalog_store::CatalogStore,
        video_search::{VideoEntity, VideoSearch},
    },
    error::ServiceError,
    services::search_cache::SearchCache,
};

pub type SharedState = Arc<AppState>;

/// Cache of video search results keyed by normalised query.
pub type VideoSearchCache = SearchCache<Vec<VideoEntity>>;

/// Central application state: storage handle, external clients and shared caches.
///
/// Solo sessions are owned by their WebSocket task and never stored here.
pub struct AppState {
    config: Arc<AppConfig>,
    catalog_store: RwLock<Option<Arc<dyn CatalogStore>>>,
    degraded: watch::Sender<bool>,
    video_search: Option<Arc<dyn VideoSearch>>,
    search_cache: VideoSearchCache,
    admin_token: Option<String>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a catalog store is installed.
    pub fn new(
        config: AppConfig,
        admin_token: Option<String>,
        video_search: Option<Arc<dyn VideoSearch>>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let search_cache = SearchCache::new(config.search.cache_ttl);
        Arc::new(Self {
            config: Arc::new(config),
            catalog_store: RwLock::new(None),
            degraded: degraded_tx,
            video_search,
            search_cache,
            admin_token,
        })
    }

    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Obtain a handle to the current catalog store, if one is installed.
    pub async fn catalog_store(&self) -> Option<Arc<dyn CatalogStore>> {
        let guard = self.catalog_store.read().await;
        guard.as_ref().cloned()
    }

    /// Catalog store for service calls, failing fast while degraded.
    pub async fn require_catalog_store(&self) -> Result<Arc<dyn CatalogStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.catalog_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new catalog store implementation and leave degraded mode.
    pub async fn install_catalog_store(&self, store: Arc<dyn CatalogStore>) {
        {
            let mut guard = self.catalog_store.write().await;
            *guard = Some(store);
        }
        self.set_degraded(false);
    }

    /// Remove the current catalog store and enter degraded mode.
    pub async fn clear_catalog_store(&self) {
        {
            let mut guard = self.catalog_store.write().await;
            guard.take();
        }
        self.set_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Client used for video search, absent when no API key is configured.
    pub fn video_search(&self) -> Option<Arc<dyn VideoSearch>> {
        self.video_search.clone()
    }

    pub fn search_cache(&self) -> &VideoSearchCache {
        &self.search_cache
    }

    /// Expected admin token, if admin routes are enabled.
    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn set_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::catalog_store::memory::MemoryCatalogStore;

    #[tokio::test]
    async fn installing_a_store_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default(), None, None);
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());
        assert!(*watcher.borrow());

        state
            .install_catalog_store(Arc::new(MemoryCatalogStore::new()))
            .await;
        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());

        state.clear_catalog_store().await;
        assert!(state.is_degraded());
        assert!(*watcher.borrow_and_update());
    }

    #[tokio::test]
    async fn degraded_state_refuses_store_access() {
        let state = AppState::new(AppConfig::default(), None, None);
        assert!(matches!(
            state.require_catalog_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .install_catalog_store(Arc::new(MemoryCatalogStore::new()))
            .await;
        assert!(state.require_catalog_store().await.is_ok());

        state.set_degraded(true);
        assert!(state.require_catalog_store().await.is_err());
    }
}
