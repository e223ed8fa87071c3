//! The record store: a handful of document operations that every gate is
//! written against, with a MongoDB backend for deployments and an in-process
//! backend for tests and demos.
//!
//! Only single-document operations are assumed to be atomic. Nothing here
//! offers multi-document transactions, so invariants spanning records must be
//! built from conditional single-document updates.

use std::sync::Arc;

use mongodb::bson::{Bson, Document};

use crate::error::Result;

mod collection;
mod errors;
mod id;
mod memory;
mod mongo;

pub use collection::{Coll, StoredRecord};
pub use errors::is_duplicate_key_error;
pub use id::Id;
pub use memory::MemoryStore;
pub use mongo::{ensure_indexes_exist, MongoStore};

/// Shared handle on whichever store backend is in use.
pub type StoreHandle = Arc<dyn Store>;

/// Document-level persistence for a fixed set of named collections.
///
/// Filters are conjunctions of top-level equality constraints, where a
/// `null` constraint also matches a missing field. Sort documents map field
/// names to `1` (ascending) or `-1` (descending).
#[rocket::async_trait]
pub trait Store: Send + Sync {
    /// The first record matching `filter`, after ordering by `sort` if given.
    async fn find_one(
        &self,
        kind: &str,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Option<Document>>;

    /// All records matching `filter`, in natural (insertion) order.
    async fn find_many(&self, kind: &str, filter: Document) -> Result<Vec<Document>>;

    /// Insert a record, assigning it an `_id` if it has none.
    async fn insert(&self, kind: &str, record: Document) -> Result<Id>;

    /// Set the fields of `set` on the first record matching `filter`.
    /// Returns the number of records matched (zero or one).
    async fn update_one(&self, kind: &str, filter: Document, set: Document) -> Result<u64>;

    /// Like [`Store::update_one`], but inserts `filter` merged with `set` if
    /// nothing matches.
    async fn upsert(&self, kind: &str, filter: Document, set: Document) -> Result<()>;

    /// The number of records matching `filter`.
    async fn count(&self, kind: &str, filter: Document) -> Result<u64>;

    /// Group every record by the value of `key` and count each group. Groups
    /// are ordered by their first-inserted record.
    async fn group_count(&self, kind: &str, key: &str) -> Result<Vec<(Bson, u64)>>;

    /// Names of the collections that currently hold data.
    async fn collection_names(&self) -> Result<Vec<String>>;
}
