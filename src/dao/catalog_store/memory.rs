use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::{
    catalog_store::{CatalogStore, StorageResult},
    models::SongEntity,
};

/// Process-local catalog used when no database is configured, and by tests.
#[derive(Clone, Default)]
pub struct MemoryCatalogStore {
    songs: Arc<RwLock<IndexMap<Uuid, SongEntity>>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `songs`.
    pub fn with_songs(songs: impl IntoIterator<Item = SongEntity>) -> Self {
        let songs = songs.into_iter().map(|song| (song.id, song)).collect();
        Self {
            songs: Arc::new(RwLock::new(songs)),
        }
    }
}

impl CatalogStore for MemoryCatalogStore {
    fn list_songs(&self) -> BoxFuture<'static, StorageResult<Vec<SongEntity>>> {
        let songs = self.songs.clone();
        Box::pin(async move { Ok(songs.read().await.values().cloned().collect()) })
    }

    fn find_song(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SongEntity>>> {
        let songs = self.songs.clone();
        Box::pin(async move { Ok(songs.read().await.get(&id).cloned()) })
    }

    fn save_song(&self, song: SongEntity) -> BoxFuture<'static, StorageResult<()>> {
        let songs = self.songs.clone();
        Box::pin(async move {
            songs.write().await.insert(song.id, song);
            Ok(())
        })
    }

    fn delete_song(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let songs = self.songs.clone();
        Box::pin(async move { Ok(songs.write().await.shift_remove(&id).is_some()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
