//! MongoDB-backed policy storage for the casbin authorization engine.
//!
//! # Purpose
//! Persists a casbin model's rule set in a MongoDB collection and loads it
//! back, implementing the engine's [`casbin::Adapter`] storage contract. The
//! adapter holds no authorization logic; it only translates between the
//! engine's variable-arity rule rows and fixed-column `ptype`/`v0..v5`
//! documents.
//!
//! # How it fits
//! A host application builds a [`MongoAdapter`], opens it, and hands it to a
//! casbin `Enforcer`. All policy mutations made through the enforcer's
//! management API flow through the adapter into the backing collection.
//!
//! # Key invariants
//! - A rule with N values occupies exactly slots `v0..v(N-1)`; higher slots
//!   are absent in the stored document, never empty strings.
//! - Rules with more than six values are rejected, not truncated.
//! - `remove_policy` matches on positional values, never on document ids.
//!
//! # Examples
//! ```rust,no_run
//! use casbin::{CoreApi, DefaultModel, Enforcer};
//! use casbin_mongo_adapter::{MongoAdapter, MongoAdapterOptions};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let options = MongoAdapterOptions::new("mongodb://localhost:27017")
//!     .database_name("casbindb")
//!     .collection_name("casbin");
//! let adapter = MongoAdapter::connect(options).await?;
//! let model = DefaultModel::from_file("rbac_model.conf").await?;
//! let enforcer = Enforcer::new(model, adapter).await?;
//! assert!(enforcer.enforce(("alice", "data1", "read"))?);
//! # Ok(())
//! # }
//! ```
//!
//! # Common pitfalls
//! - `save_policy` clears the collection and re-inserts in two separate
//!   operations; a concurrent reader can observe a transient empty state.
//! - After a filtered load only part of the rule set is in memory; saving the
//!   model back would drop the rules that were filtered out.

mod adapter;
mod config;
mod error;
mod rule;
pub mod store;

pub use adapter::MongoAdapter;
pub use config::{MongoAdapterOptions, DEFAULT_COLLECTION_NAME, DEFAULT_DATABASE_NAME};
pub use error::{AdapterError, AdapterResult};
pub use rule::{CasbinRule, LoadFilter, RuleFilter, MAX_RULE_VALUES};
pub use store::memory::InMemoryPolicyStore;
pub use store::mongo::MongoPolicyStore;
pub use store::PolicyStore;
