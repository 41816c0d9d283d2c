// src/db/shared.rs

use async_trait::async_trait;
use log::info;
use tokio_rusqlite::Connection;

use super::error::RepoError;
use super::handler::EntityRepository;
use super::monitoring::measure;
use super::person::{Person, PersonFilter};
use super::person_repo;
use super::statement::Statement;
use crate::config::DatabaseConfig;

/// Async counterpart of [`super::PersonRepository`].
///
/// `tokio_rusqlite` runs every call on one background thread, so clones of
/// this repository can be used from many tasks; their calls are serialized.
#[derive(Clone)]
pub struct SharedPersonRepository {
    conn: Connection,
}

impl SharedPersonRepository {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub async fn open(config: &DatabaseConfig) -> Result<Self, RepoError> {
        const OP: &str = "open_connection";

        info!("Opening shared database {}", config.descriptor());
        let conn = Connection::open_with_flags(&config.path, super::OPEN_FLAGS)
            .await
            .map_err(|e| from_worker_error(OP, e))?;

        let repo = Self::new(conn);
        let config = config.clone();
        repo.call(OP, move |conn| super::configure(conn, &config))
            .await?;
        Ok(repo)
    }

    pub async fn open_in_memory() -> Result<Self, RepoError> {
        Self::open(&DatabaseConfig::in_memory()).await
    }

    pub async fn ensure_schema(&self) -> Result<(), RepoError> {
        self.call("ensure_schema", |conn| {
            measure("ensure_schema", || person_repo::ensure_schema(conn))
        })
        .await
    }

    pub async fn insert_many(&self, rows: Vec<Person>) -> Result<usize, RepoError> {
        self.call("insert_many", move |conn| {
            measure("insert_many", || person_repo::insert_many(conn, &rows))
        })
        .await
    }

    pub async fn update_age(&self, name: impl Into<String>, new_age: i64) -> Result<usize, RepoError> {
        let name = name.into();
        self.call("update_age", move |conn| {
            measure("update_age", || person_repo::update_age(conn, &name, new_age))
        })
        .await
    }

    pub async fn delete(&self, name: impl Into<String>) -> Result<usize, RepoError> {
        let name = name.into();
        self.call("delete", move |conn| {
            measure("delete", || person_repo::delete(conn, &name))
        })
        .await
    }

    pub async fn find_by_name(&self, name: impl Into<String>) -> Result<Option<Person>, RepoError> {
        let name = name.into();
        self.call("find_by_name", move |conn| {
            measure("find_by_name", || person_repo::find_by_name(conn, &name))
        })
        .await
    }

    pub async fn query(&self, filter: PersonFilter) -> Result<Vec<Person>, RepoError> {
        self.call("query", move |conn| {
            measure("query", || person_repo::query(conn, &filter))
        })
        .await
    }

    pub async fn count(&self) -> Result<usize, RepoError> {
        self.call("count", |conn| measure("count", || person_repo::count(conn)))
            .await
    }

    pub async fn run_transaction(&self, steps: Vec<Statement>) -> Result<Vec<usize>, RepoError> {
        self.call("run_transaction", move |conn| {
            measure("run_transaction", || person_repo::run_transaction(conn, &steps))
        })
        .await
    }

    /// Runs `f` on the worker thread, carrying a [`RepoError`] back unchanged.
    async fn call<T, F>(&self, op: &'static str, f: F) -> Result<T, RepoError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, RepoError> + Send + 'static,
        T: Send + 'static,
    {
        self.conn
            .call(move |conn| f(conn).map_err(|e| tokio_rusqlite::Error::Other(Box::new(e))))
            .await
            .map_err(|e| from_worker_error(op, e))
    }
}

fn from_worker_error(op: &'static str, err: tokio_rusqlite::Error) -> RepoError {
    match err {
        tokio_rusqlite::Error::Other(inner) => match inner.downcast::<RepoError>() {
            Ok(repo_err) => *repo_err,
            Err(other) => RepoError::Background {
                op,
                reason: other.to_string(),
            },
        },
        tokio_rusqlite::Error::Rusqlite(source) => RepoError::Connection { op, source },
        other => RepoError::Background {
            op,
            reason: other.to_string(),
        },
    }
}

#[async_trait]
impl EntityRepository<Person, String> for SharedPersonRepository {
    async fn get(&self, key: String) -> Result<Option<Person>, RepoError> {
        self.find_by_name(key).await
    }

    async fn insert(&self, entity: Person) -> Result<usize, RepoError> {
        self.insert_many(vec![entity]).await
    }

    async fn delete(&self, key: String) -> Result<usize, RepoError> {
        SharedPersonRepository::delete(self, key).await
    }
}
