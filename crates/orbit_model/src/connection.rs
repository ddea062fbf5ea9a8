//! Storage connections.
//!
//! Persistence phases hand listeners the [`ConnectionHandle`] the operation
//! runs on. A [`Connection`] is a table-oriented store of JSON rows keyed by
//! an integer primary key; [`MemoryConnection`] is the in-process
//! implementation.
//!
//! Listeners that need backend-specific access downcast the handle:
//!
//! ```
//! use orbit_model::connection::{ConnectionHandle, MemoryConnection};
//!
//! let handle = ConnectionHandle::new(MemoryConnection::new("primary"));
//! let memory = handle.downcast_ref::<MemoryConnection>().unwrap();
//! assert_eq!(memory.operations().len(), 0);
//! ```

use core::fmt;
use core::ops::Deref;
use std::collections::BTreeMap;
use std::sync::Arc;

use downcast_rs::{DowncastSync, impl_downcast};
use hashbrown::HashMap;
use parking_lot::Mutex;
use serde_json::Value;

/// A storage row: column name to JSON value.
pub type Row = serde_json::Map<String, Value>;

/// Errors raised by a storage connection.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No row exists for the key.
    #[error("table '{table}' has no row with key {key}")]
    RowNotFound {
        /// The table searched.
        table: String,
        /// The missing key.
        key: i64,
    },

    /// A model did not serialize to a JSON object.
    #[error("model for table '{table}' did not serialize to a row")]
    InvalidRow {
        /// The target table.
        table: String,
    },

    /// Conversion between a model and a row failed.
    #[error("row conversion failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("connection '{connection}' failed: {message}")]
    Backend {
        /// Name of the failing connection.
        connection: String,
        /// Backend error message.
        message: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection
// ─────────────────────────────────────────────────────────────────────────────

/// A storage backend.
pub trait Connection: DowncastSync {
    /// Name of this connection, for diagnostics.
    fn name(&self) -> &str;

    /// Inserts `row` into `table`, assigning a fresh key stored under
    /// `key_column`. Returns the assigned key.
    fn insert(&self, table: &str, key_column: &str, row: Row) -> Result<i64, StorageError>;

    /// Replaces the row stored under `key`.
    fn update(&self, table: &str, key: i64, row: Row) -> Result<(), StorageError>;

    /// Deletes the row stored under `key`. Returns `false` if none existed.
    fn delete(&self, table: &str, key: i64) -> Result<bool, StorageError>;

    /// Fetches the row stored under `key`.
    fn fetch(&self, table: &str, key: i64) -> Result<Option<Row>, StorageError>;
}

impl_downcast!(sync Connection);

/// Shared handle to a [`Connection`].
///
/// Cloning is cheap; clones refer to the same connection.
#[derive(Clone)]
pub struct ConnectionHandle(Arc<dyn Connection>);

impl ConnectionHandle {
    /// Wraps a connection.
    pub fn new(connection: impl Connection) -> Self {
        Self(Arc::new(connection))
    }

    /// Wraps an already shared connection.
    #[must_use]
    pub fn from_arc(connection: Arc<dyn Connection>) -> Self {
        Self(connection)
    }

    /// Returns the concrete connection if it is a `C`.
    #[must_use]
    pub fn downcast_ref<C: Connection>(&self) -> Option<&C> {
        self.0.downcast_ref::<C>()
    }

    /// Returns `true` if both handles refer to the same connection.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for ConnectionHandle {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionHandle").field(&self.0.name()).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryConnection
// ─────────────────────────────────────────────────────────────────────────────

/// A write recorded by [`MemoryConnection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    /// A row was inserted.
    Insert {
        /// Target table.
        table: String,
        /// Assigned key.
        key: i64,
    },
    /// A row was replaced.
    Update {
        /// Target table.
        table: String,
        /// Row key.
        key: i64,
    },
    /// A row was removed.
    Delete {
        /// Target table.
        table: String,
        /// Row key.
        key: i64,
    },
}

#[derive(Default)]
struct Table {
    last_key: i64,
    rows: BTreeMap<i64, Row>,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, Table>,
    log: Vec<StorageOp>,
}

/// In-memory connection with auto-increment keys and a write log.
pub struct MemoryConnection {
    name: String,
    state: Mutex<MemoryState>,
}

impl MemoryConnection {
    /// Creates an empty store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Returns every successful write, oldest first.
    #[must_use]
    pub fn operations(&self) -> Vec<StorageOp> {
        self.state.lock().log.clone()
    }

    /// Returns the number of rows in `table`.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.state
            .lock()
            .tables
            .get(table)
            .map_or(0, |table| table.rows.len())
    }

    fn not_found(table: &str, key: i64) -> StorageError {
        StorageError::RowNotFound {
            table: table.to_owned(),
            key,
        }
    }
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl Connection for MemoryConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&self, table: &str, key_column: &str, mut row: Row) -> Result<i64, StorageError> {
        let mut state = self.state.lock();
        let entry = state.tables.entry(table.to_owned()).or_default();
        entry.last_key += 1;
        let key = entry.last_key;
        row.insert(key_column.to_owned(), Value::from(key));
        entry.rows.insert(key, row);
        state.log.push(StorageOp::Insert {
            table: table.to_owned(),
            key,
        });
        Ok(key)
    }

    fn update(&self, table: &str, key: i64, row: Row) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        let slot = state
            .tables
            .get_mut(table)
            .and_then(|table| table.rows.get_mut(&key))
            .ok_or_else(|| Self::not_found(table, key))?;
        *slot = row;
        state.log.push(StorageOp::Update {
            table: table.to_owned(),
            key,
        });
        Ok(())
    }

    fn delete(&self, table: &str, key: i64) -> Result<bool, StorageError> {
        let mut state = self.state.lock();
        let removed = state
            .tables
            .get_mut(table)
            .and_then(|table| table.rows.remove(&key))
            .is_some();
        if removed {
            state.log.push(StorageOp::Delete {
                table: table.to_owned(),
                key,
            });
        }
        Ok(removed)
    }

    fn fetch(&self, table: &str, key: i64) -> Result<Option<Row>, StorageError> {
        Ok(self
            .state
            .lock()
            .tables
            .get(table)
            .and_then(|table| table.rows.get(&key))
            .cloned())
    }
}
