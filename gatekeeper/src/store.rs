//! Postgres-backed store handle shared by every gate.
//!
//! All cross-request state (rate-limit counters, message history, last
//! activity) lives in three tables reached over a single connection.
//! Every statement auto-commits; the database is the only
//! synchronization point between concurrent pipeline executions.

use std::sync::Arc;

use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row};
use tracing::error;

/// Error type for store operations.
///
/// Storage failures are fatal to the in-flight request: callers propagate
/// them to the process boundary instead of retrying.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared reference to a [`Db`].
pub type SharedDb = Arc<Db>;

/// Handle to the shared relational store.
pub struct Db {
    client: Client,
}

impl Db {
    /// Connect to the store and drive the connection on a background task.
    pub async fn connect(conn_str: &str) -> StoreResult<Self> {
        let (client, connection) = tokio_postgres::connect(conn_str, NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("postgres connection error: {e}");
            }
        });

        Ok(Self { client })
    }

    /// Create the three tables if they do not exist yet.
    ///
    /// Schema compatibility matters here: the tables are shared with any
    /// other process pointed at the same database.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        self.client
            .execute(
                "CREATE TABLE IF NOT EXISTS message_queue (
                     id SERIAL PRIMARY KEY,
                     owner_id TEXT,
                     message TEXT,
                     timestamp_ TIMESTAMP DEFAULT CURRENT_TIMESTAMP)",
                &[],
            )
            .await?;

        self.client
            .execute(
                "CREATE TABLE IF NOT EXISTS last_activity (
                     owner_id TEXT PRIMARY KEY,
                     timestamp_ TIMESTAMP DEFAULT CURRENT_TIMESTAMP)",
                &[],
            )
            .await?;

        self.client
            .execute(
                "CREATE TABLE IF NOT EXISTS ratelimit (
                     key TEXT PRIMARY KEY,
                     count INTEGER DEFAULT 1,
                     timestamp_ TIMESTAMP DEFAULT CURRENT_TIMESTAMP)",
                &[],
            )
            .await?;

        Ok(())
    }

    /// Create a shared reference to this store.
    pub fn shared(self) -> SharedDb {
        Arc::new(self)
    }

    /// Run a query against the store. Exposed for tests and tooling;
    /// the gates below own the statements used in production.
    pub async fn query(
        &self,
        statement: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> StoreResult<Vec<Row>> {
        Ok(self.client.query(statement, params).await?)
    }

    /// Run a statement against the store, returning the affected row count.
    pub async fn execute(
        &self,
        statement: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> StoreResult<u64> {
        Ok(self.client.execute(statement, params).await?)
    }
}
