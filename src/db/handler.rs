// src/db/handler.rs

use async_trait::async_trait;

use super::error::RepoError;

/// Key-based access to one entity type.
#[async_trait]
pub trait EntityRepository<T, K> {
    async fn get(&self, key: K) -> Result<Option<T>, RepoError>;
    /// Returns rows inserted.
    async fn insert(&self, entity: T) -> Result<usize, RepoError>;
    /// Returns rows deleted; zero when the key is unknown.
    async fn delete(&self, key: K) -> Result<usize, RepoError>;
}
