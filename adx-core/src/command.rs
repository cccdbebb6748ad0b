//! The management-command execution boundary
//!
//! Everything that talks to a cluster goes through [`CommandExecutor`]: one
//! method that runs a management command against a database and returns the
//! primary result table. Components above this trait never see HTTP.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The remote service rejected or failed a management command.
///
/// Carries the command and database for context; never retried internally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("error executing management command ({command}) against database ({database}): {message}")]
pub struct RemoteError {
    pub database: String,
    pub command: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(
        database: impl Into<String>,
        command: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            command: command.into(),
            message: message.into(),
        }
    }
}

/// Primary result table of a management command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self { columns, rows }
    }

    /// True when the command returned no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Decode every row into `T` by pairing column names with row values.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<Vec<T>, serde_json::Error> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| {
                let mut object = serde_json::Map::with_capacity(columns.len());
                for (column, value) in columns.iter().zip(row) {
                    object.insert(column.clone(), value);
                }
                serde_json::from_value(serde_json::Value::Object(object))
            })
            .collect()
    }
}

/// Narrow boundary to the remote cluster.
///
/// Implementations are expected to be internally thread-safe; a single
/// handle is shared across concurrently running resource operations.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// The cluster endpoint this executor talks to, scheme included.
    fn endpoint(&self) -> &str;

    /// Run a management command and return the primary result table.
    async fn execute(&self, database: &str, command: &str) -> Result<RowSet, RemoteError>;
}
