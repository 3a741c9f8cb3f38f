//! Narrow interface over the backing document store.
//!
//! The adapter consumes the store as a black-box CRUD service over one
//! collection of rule documents. Two backends implement it: the durable
//! MongoDB store and an in-memory store for development and tests.

use async_trait::async_trait;

use crate::error::AdapterResult;
use crate::rule::{CasbinRule, LoadFilter, RuleFilter};

pub mod memory;
pub mod mongo;

#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Establishes the connection. Safe to call on an already-connected
    /// store.
    async fn connect(&self) -> AdapterResult<()>;

    /// Releases the connection. A no-op when not connected.
    async fn disconnect(&self) -> AdapterResult<()>;

    /// Returns all rule documents, optionally constrained by a load filter.
    async fn find(&self, filter: Option<&LoadFilter>) -> AdapterResult<Vec<CasbinRule>>;

    async fn insert_one(&self, rule: CasbinRule) -> AdapterResult<()>;

    /// Bulk insert; an empty batch is a no-op, not an error.
    async fn insert_many(&self, rules: Vec<CasbinRule>) -> AdapterResult<()>;

    /// Deletes at most one document matching the filter; returns the number
    /// deleted (0 or 1). Zero matches is not an error.
    async fn delete_one(&self, filter: &RuleFilter) -> AdapterResult<u64>;

    /// Deletes every document matching the filter; returns the number
    /// deleted.
    async fn delete_many(&self, filter: &RuleFilter) -> AdapterResult<u64>;

    /// Provisions the lookup indexes. Callers treat failure as non-fatal.
    async fn ensure_indexes(&self) -> AdapterResult<()>;

    /// Empties the backing collection. A missing collection is not an error;
    /// drop failures are logged and swallowed.
    async fn clear(&self) -> AdapterResult<()>;

    fn backend_name(&self) -> &'static str;
}
