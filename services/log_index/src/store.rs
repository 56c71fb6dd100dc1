//! Read-only adapter over a SQLite log file.
//!
//! The adapter owns the connection pool and nothing else: it executes
//! [`LoweredQuery`] values and hands decoded rows back. Store failures are
//! propagated unchanged and never retried here.

use crate::config::DatabaseConfig;
use crate::error::{IndexError, Result};
use crate::query::LoweredQuery;
use crate::token::Token;
use futures::TryStreamExt;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Transaction};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Connection pool over one log file.
///
/// Cloning is cheap and shares the pool. Every connection is opened read-only,
/// so concurrent readers never observe a write from this process.
#[derive(Clone, Debug)]
pub struct LogStore {
    pool: SqlitePool,
}

impl LogStore {
    /// Open a log file with the configured reader pool
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.log_path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .connect_with(options)
            .await?;

        info!(log_path = %config.log_path, "Opened log file");

        Ok(Self { pool })
    }

    /// Open a log file with default pool settings
    pub async fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().into_owned();
        Self::open(&DatabaseConfig::for_path(path)).await
    }

    /// Run a query and decode every row as it streams in
    #[instrument(skip_all, fields(operation = query.operation()))]
    pub async fn fetch_all<T, F>(&self, query: &LoweredQuery, decode: F) -> Result<Vec<T>>
    where
        F: Fn(&SqliteRow) -> Result<T>,
    {
        let started = Instant::now();
        let mut rows = query.to_sqlx().fetch(&self.pool);
        let mut out = Vec::new();
        while let Some(row) = rows.try_next().await? {
            out.push(decode(&row)?);
        }
        record_query(query.operation(), started, out.len());
        Ok(out)
    }

    /// Run a query expected to yield at most one row
    #[instrument(skip_all, fields(operation = query.operation()))]
    pub async fn fetch_optional<T, F>(&self, query: &LoweredQuery, decode: F) -> Result<Option<T>>
    where
        F: FnOnce(&SqliteRow) -> Result<T>,
    {
        let started = Instant::now();
        let row = query.to_sqlx().fetch_optional(&self.pool).await?;
        let out = row.as_ref().map(decode).transpose()?;
        record_query(query.operation(), started, usize::from(out.is_some()));
        Ok(out)
    }

    /// Begin a read transaction so several statements see the same log state
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let tx = self.pool.begin().await?;
        Ok(Snapshot { tx })
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get the connection pool (for health checks)
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// A read transaction spanning several statements
pub struct Snapshot {
    tx: Transaction<'static, Sqlite>,
}

impl Snapshot {
    #[instrument(skip_all, fields(operation = query.operation()))]
    pub async fn fetch_all<T, F>(&mut self, query: &LoweredQuery, decode: F) -> Result<Vec<T>>
    where
        F: Fn(&SqliteRow) -> Result<T>,
    {
        let started = Instant::now();
        let rows = query.to_sqlx().fetch_all(&mut *self.tx).await?;
        let out = rows.iter().map(decode).collect::<Result<Vec<_>>>()?;
        record_query(query.operation(), started, out.len());
        Ok(out)
    }

    #[instrument(skip_all, fields(operation = query.operation()))]
    pub async fn fetch_optional<T, F>(
        &mut self,
        query: &LoweredQuery,
        decode: F,
    ) -> Result<Option<T>>
    where
        F: FnOnce(&SqliteRow) -> Result<T>,
    {
        let started = Instant::now();
        let row = query.to_sqlx().fetch_optional(&mut *self.tx).await?;
        let out = row.as_ref().map(decode).transpose()?;
        record_query(query.operation(), started, usize::from(out.is_some()));
        Ok(out)
    }

    /// End the transaction
    pub async fn finish(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

fn record_query(operation: &'static str, started: Instant, rows: usize) {
    let elapsed = started.elapsed();
    metrics::counter!("log_index.queries", "operation" => operation).increment(1);
    metrics::histogram!("log_index.query_seconds", "operation" => operation)
        .record(elapsed.as_secs_f64());
    debug!(
        operation,
        rows,
        elapsed_us = elapsed.as_micros() as u64,
        "Query completed"
    );
}

// Column helpers shared by the row decoders

pub(crate) fn token_column(row: &SqliteRow, table: &'static str, column: &str) -> Result<Token> {
    let bytes: Vec<u8> = row.try_get(column)?;
    Token::from_slice(&bytes).map_err(|e| IndexError::malformed(table, format!("{column}: {e}")))
}

pub(crate) fn optional_token_column(
    row: &SqliteRow,
    table: &'static str,
    column: &str,
) -> Result<Option<Token>> {
    let bytes: Option<Vec<u8>> = row.try_get(column)?;
    bytes
        .map(|b| {
            Token::from_slice(&b)
                .map_err(|e| IndexError::malformed(table, format!("{column}: {e}")))
        })
        .transpose()
}
