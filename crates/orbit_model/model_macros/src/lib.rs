//! Procedural macros for `orbit_model`.
//!
//! This crate provides `#[derive(Model)]`, which gives a struct the
//! lifecycle event capability and its row mapping.

mod model;

use proc_macro::TokenStream;

/// Derive macro for persistent models.
///
/// Generates implementations of `orbit_model::EventDispatcherAware` and
/// `orbit_model::Record` for a struct with named fields. The struct must
/// also implement `Default`, `Serialize` and `Deserialize`.
///
/// # Attributes
///
/// On the struct:
/// - `table` (optional): The storage table. Defaults to the struct name in
///   `snake_case`.
/// - `dispatcher` (optional): The dispatcher kind for this model's channel.
///   Unknown kinds fall back to the configured default.
///
/// On a field:
/// - `primary_key`: Marks the `Option<i64>` key field. Defaults to the field
///   named `id`.
///
/// Loading a row assigns each deserialized field in place, so fields marked
/// `#[serde(skip)]` keep their current values.
///
/// # Example
///
/// ```ignore
/// use serde::{Deserialize, Serialize};
/// use orbit_model::Model;
///
/// #[derive(Default, Serialize, Deserialize, Model)]
/// #[model(table = "forum_threads", dispatcher = "traceable")]
/// struct Thread {
///     #[model(primary_key)]
///     thread_id: Option<i64>,
///     subject: String,
/// }
/// ```
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    model::derive_model(input)
}
