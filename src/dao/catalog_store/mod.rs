#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use std::error::Error;

use futures::future::BoxFuture;
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::SongEntity;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by catalog backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Abstraction over the persistence layer holding the song library.
pub trait CatalogStore: Send + Sync {
    /// Every stored song, in backend order.
    fn list_songs(&self) -> BoxFuture<'static, StorageResult<Vec<SongEntity>>>;
    fn find_song(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SongEntity>>>;
    /// Insert or replace a song record.
    fn save_song(&self, song: SongEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove a song, returning whether it existed.
    fn delete_song(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
