use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::catalog_store::{CatalogStore, StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a catalog store installed, dropping into degraded mode while it is unreachable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn CatalogStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_catalog_store(store.clone()).await;
                info!("catalog connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                if !watch_store(&state, store.as_ref()).await {
                    warn!("exhausted catalog reconnect attempts; dropping the connection");
                    state.clear_catalog_store().await;
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "catalog connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the store until it can no longer be revived. Returns `false` once it is lost.
async fn watch_store(state: &SharedState, store: &dyn CatalogStore) -> bool {
    loop {
        if store.health_check().await.is_ok() {
            if state.is_degraded() {
                info!("catalog healthy again; leaving degraded mode");
                state.set_degraded(false);
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        let mut reconnect_delay = INITIAL_DELAY;
        let mut reconnected = false;
        for attempt in 0..MAX_RECONNECT_ATTEMPTS {
            match store.try_reconnect().await {
                Ok(()) => {
                    info!(attempt, "catalog reconnection succeeded after health check failure");
                    reconnected = true;
                    break;
                }
                Err(err) => {
                    if attempt == 0 {
                        warn!(attempt, error = %err, "catalog reconnect failed; entering degraded mode");
                        state.set_degraded(true);
                    } else {
                        warn!(attempt, error = %err, "catalog reconnect attempt failed");
                    }
                    sleep(reconnect_delay).await;
                    reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                }
            }
        }

        if !reconnected {
            return false;
        }
        state.set_degraded(false);
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use futures::future::BoxFuture;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{catalog_store::memory::MemoryCatalogStore, models::SongEntity},
        state::AppState,
    };

    /// Store whose health check always fails and which never reconnects.
    struct BrokenStore {
        reconnects: AtomicU32,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct Refused;

    fn refused() -> StorageError {
        StorageError::unavailable("test".into(), Refused)
    }

    impl CatalogStore for BrokenStore {
        fn list_songs(&self) -> BoxFuture<'static, Result<Vec<SongEntity>, StorageError>> {
            Box::pin(async { Err(refused()) })
        }
        fn find_song(&self, _: Uuid) -> BoxFuture<'static, Result<Option<SongEntity>, StorageError>> {
            Box::pin(async { Err(refused()) })
        }
        fn save_song(&self, _: SongEntity) -> BoxFuture<'static, Result<(), StorageError>> {
            Box::pin(async { Err(refused()) })
        }
        fn delete_song(&self, _: Uuid) -> BoxFuture<'static, Result<bool, StorageError>> {
            Box::pin(async { Err(refused()) })
        }
        fn health_check(&self) -> BoxFuture<'static, Result<(), StorageError>> {
            Box::pin(async { Err(refused()) })
        }
        fn try_reconnect(&self) -> BoxFuture<'static, Result<(), StorageError>> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(refused()) })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lost_store_is_dropped_after_bounded_reconnects() {
        let state = AppState::new(AppConfig::default(), None, None);
        let store = BrokenStore {
            reconnects: AtomicU32::new(0),
        };
        state
            .install_catalog_store(Arc::new(MemoryCatalogStore::new()))
            .await;

        let alive = watch_store(&state, &store).await;
        assert!(!alive);
        assert!(state.is_degraded());
        assert_eq!(store.reconnects.load(Ordering::SeqCst), MAX_RECONNECT_ATTEMPTS);
    }
}
