//! Document store: JSON documents addressed by `(collection, id)`, kept in SQLite.
//!
//! Reads go straight to the pool. Every write runs inside a transaction;
//! [`DocStore::run_transaction`] retries its closure when SQLite reports
//! that a concurrent writer got there first.

pub mod document;

use std::{path::Path, str::FromStr, time::Duration};

use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use sqlx::{
    Sqlite, SqliteConnection, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tracing::{debug, warn};

pub use document::Document;

use crate::utils::now_utc;

const MAX_ATTEMPTS: u32 = 5;

const SCHEMA: &str = r#"
create table if not exists documents (
    collection text not null,
    id text not null,
    data text not null,
    update_time text not null,
    primary key (collection, id)
)"#;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("document {collection}/{id} is corrupt: {source}")]
    Corrupt {
        collection: String,
        id: String,
        source: serde_json::Error,
    },
    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("transaction gave up after {attempts} contended attempts")]
    Contention { attempts: u32 },
}

impl StoreError {
    pub fn is_contention(&self) -> bool {
        match self {
            StoreError::Database(e) => is_busy(e),
            StoreError::Contention { .. } => true,
            _ => false,
        }
    }
}

/// SQLITE_BUSY / SQLITE_LOCKED and their extended codes.
fn is_busy(error: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = error else {
        return false;
    };
    db.code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, 5 | 6))
}

#[derive(Debug, Clone)]
pub struct DocStore {
    pool: SqlitePool,
}

impl DocStore {
    /// Open (creating if missing) a file-backed store.
    pub async fn connect(path: impl AsRef<Path>, max_connections: u32) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Database(sqlx::Error::Io(e)))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// A private in-memory store. A single connection that never idles out
    /// keeps the database alive for the lifetime of the pool.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        read(&mut *conn, collection, id).await
    }

    pub async fn get_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, StoreError> {
        match self.get(collection, id).await? {
            Some(doc) => decode(collection, id, doc).map(Some),
            None => Ok(None),
        }
    }

    /// All documents of a collection ordered by id.
    pub async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "select id, data from documents where collection = ? order by id",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(id, data)| {
                let doc = parse(collection, &id, &data)?;
                Ok((id, doc))
            })
            .collect()
    }

    pub async fn list_as<T: DeserializeOwned>(
        &self,
        collection: &str,
    ) -> Result<Vec<(String, T)>, StoreError> {
        self.list(collection)
            .await?
            .into_iter()
            .map(|(id, doc)| {
                let value = decode(collection, &id, doc)?;
                Ok((id, value))
            })
            .collect()
    }

    pub async fn list_ids(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        let ids = sqlx::query_scalar::<_, String>(
            "select id from documents where collection = ? order by id",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Overwrite the whole document.
    pub async fn set(&self, collection: &str, id: &str, doc: Document) -> Result<(), StoreError> {
        let (collection, id) = (collection.to_owned(), id.to_owned());
        self.run_transaction(|tx| {
            let (collection, id, doc) = (collection.clone(), id.clone(), doc.clone());
            Box::pin(async move { tx.set(&collection, &id, doc).await })
        })
        .await
    }

    /// Set-with-merge: creates the document if it does not exist.
    pub async fn merge(&self, collection: &str, id: &str, patch: Document) -> Result<(), StoreError> {
        let (collection, id) = (collection.to_owned(), id.to_owned());
        self.run_transaction(|tx| {
            let (collection, id, patch) = (collection.clone(), id.clone(), patch.clone());
            Box::pin(async move { tx.merge(&collection, &id, patch).await })
        })
        .await
    }

    /// Delete one (possibly nested) field. Returns whether it existed.
    pub async fn delete_field(
        &self,
        collection: &str,
        id: &str,
        path: &[&str],
    ) -> Result<bool, StoreError> {
        let (collection, id) = (collection.to_owned(), id.to_owned());
        let path: Vec<String> = path.iter().map(|s| s.to_string()).collect();
        self.run_transaction(|tx| {
            let (collection, id, path) = (collection.clone(), id.clone(), path.clone());
            Box::pin(async move {
                let path: Vec<&str> = path.iter().map(String::as_str).collect();
                tx.delete_field(&collection, &id, &path).await
            })
        })
        .await
    }

    /// Delete a document. Returns whether it existed.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        remove(&mut *conn, collection, id).await
    }

    /// Run `f` in a transaction and commit what it wrote. When SQLite reports
    /// a conflicting writer the transaction is rolled back and `f` runs again.
    pub async fn run_transaction<T, E, F>(&self, mut f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: for<'t> FnMut(&'t mut Transaction) -> BoxFuture<'t, Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            // write lock taken at BEGIN, so busy_timeout queues concurrent writers
            let inner = self
                .pool
                .begin_with("BEGIN IMMEDIATE")
                .await
                .map_err(StoreError::from)?;
            let mut tx = Transaction {
                inner,
                contended: false,
            };
            let result = f(&mut tx).await;
            let retry = match result {
                Ok(value) => match tx.inner.commit().await {
                    Ok(()) => return Ok(value),
                    Err(e) if is_busy(&e) => None,
                    Err(e) => return Err(StoreError::from(e).into()),
                },
                Err(e) => {
                    let contended = tx.contended;
                    if let Err(rollback) = tx.inner.rollback().await {
                        warn!("rollback failed: {}", rollback);
                    }
                    if !contended {
                        return Err(e);
                    }
                    Some(e)
                }
            };
            if attempt >= MAX_ATTEMPTS {
                return Err(match retry {
                    Some(e) => e,
                    None => StoreError::Contention { attempts: attempt }.into(),
                });
            }
            debug!("transaction contended, retrying (attempt {})", attempt);
            tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
        }
    }
}

/// Handle passed to a [`DocStore::run_transaction`] closure.
pub struct Transaction {
    inner: sqlx::Transaction<'static, Sqlite>,
    contended: bool,
}

impl Transaction {
    fn track<T>(&mut self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        if let Err(e) = &result {
            if e.is_contention() {
                self.contended = true;
            }
        }
        result
    }

    pub async fn get(&mut self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let result = read(&mut *self.inner, collection, id).await;
        self.track(result)
    }

    pub async fn get_as<T: DeserializeOwned>(
        &mut self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, StoreError> {
        match self.get(collection, id).await? {
            Some(doc) => decode(collection, id, doc).map(Some),
            None => Ok(None),
        }
    }

    pub async fn set(&mut self, collection: &str, id: &str, doc: Document) -> Result<(), StoreError> {
        let result = write(&mut *self.inner, collection, id, &doc).await;
        self.track(result)
    }

    pub async fn set_as<T: Serialize>(
        &mut self,
        collection: &str,
        id: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let doc = document::to_document(value)?;
        self.set(collection, id, doc).await
    }

    pub async fn merge(&mut self, collection: &str, id: &str, patch: Document) -> Result<(), StoreError> {
        let mut doc = self.get(collection, id).await?.unwrap_or_default();
        document::merge_into(&mut doc, patch);
        self.set(collection, id, doc).await
    }

    pub async fn delete_field(
        &mut self,
        collection: &str,
        id: &str,
        path: &[&str],
    ) -> Result<bool, StoreError> {
        let Some(mut doc) = self.get(collection, id).await? else {
            return Ok(false);
        };
        if !document::delete_field(&mut doc, path) {
            return Ok(false);
        }
        self.set(collection, id, doc).await?;
        Ok(true)
    }

    pub async fn delete(&mut self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let result = remove(&mut *self.inner, collection, id).await;
        self.track(result)
    }
}

async fn read(
    conn: &mut SqliteConnection,
    collection: &str,
    id: &str,
) -> Result<Option<Document>, StoreError> {
    let data = sqlx::query_scalar::<_, String>(
        "select data from documents where collection = ? and id = ?",
    )
    .bind(collection)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    data.map(|data| parse(collection, id, &data)).transpose()
}

async fn write(
    conn: &mut SqliteConnection,
    collection: &str,
    id: &str,
    doc: &Document,
) -> Result<(), StoreError> {
    let data = serde_json::to_string(doc)?;
    sqlx::query(
        "insert into documents (collection, id, data, update_time) values (?, ?, ?, ?) \
         on conflict (collection, id) do update set data = excluded.data, update_time = excluded.update_time",
    )
    .bind(collection)
    .bind(id)
    .bind(data)
    .bind(now_utc())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn remove(conn: &mut SqliteConnection, collection: &str, id: &str) -> Result<bool, StoreError> {
    let result = sqlx::query("delete from documents where collection = ? and id = ?")
        .bind(collection)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn parse(collection: &str, id: &str, data: &str) -> Result<Document, StoreError> {
    serde_json::from_str(data).map_err(|source| StoreError::Corrupt {
        collection: collection.to_owned(),
        id: id.to_owned(),
        source,
    })
}

fn decode<T: DeserializeOwned>(collection: &str, id: &str, doc: Document) -> Result<T, StoreError> {
    document::from_document(doc).map_err(|source| StoreError::Corrupt {
        collection: collection.to_owned(),
        id: id.to_owned(),
        source,
    })
}
