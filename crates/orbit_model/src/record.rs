//! Row mapping for persistent models.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::aware::EventDispatcherAware;
use crate::connection::{Row, StorageError};

/// A model stored as one row of a table.
///
/// `#[derive(Model)]` implements this next to [`EventDispatcherAware`]; the
/// row mapping itself comes from the model's `serde` implementations.
pub trait Record: EventDispatcherAware + Serialize + DeserializeOwned + Default {
    /// Table the model is stored in.
    const TABLE: &'static str;

    /// Column holding the primary key.
    const PRIMARY_KEY: &'static str;

    /// Returns the primary key, or `None` if the model was never stored.
    fn primary_key(&self) -> Option<i64>;

    /// Sets the primary key assigned by storage.
    fn set_primary_key(&mut self, key: i64);

    /// Returns `true` if saving this model inserts rather than updates.
    fn is_new(&self) -> bool {
        self.primary_key().is_none()
    }

    /// Serializes the model into a row.
    fn to_row(&self) -> Result<Row, StorageError> {
        match serde_json::to_value(self)? {
            Value::Object(row) => Ok(row),
            _ => Err(StorageError::InvalidRow {
                table: Self::TABLE.to_owned(),
            }),
        }
    }

    /// Deserializes a model from a row.
    fn from_row(row: Row) -> Result<Self, StorageError> {
        Ok(serde_json::from_value(Value::Object(row))?)
    }

    /// Applies a storage row to this instance.
    ///
    /// The provided implementation replaces the whole value.
    /// `#[derive(Model)]` assigns the deserialized fields one by one instead,
    /// leaving fields marked `#[serde(skip)]` or `#[serde(skip_deserializing)]`
    /// untouched.
    fn apply_row(&mut self, row: Row) -> Result<(), StorageError> {
        *self = Self::from_row(row)?;
        Ok(())
    }
}
