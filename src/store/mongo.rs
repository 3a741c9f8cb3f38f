//! MongoDB-backed implementation of the policy store.
//!
//! # Purpose
//! Implements [`PolicyStore`] against one collection of rule documents using
//! the official driver. Connection pooling, retries, and timeouts are the
//! driver's concern; this module only issues the CRUD round trips the
//! adapter needs.
//!
//! # Connection lifecycle
//! The client is built lazily: construction parses and validates the URI,
//! `connect` builds the client and pings the server, `disconnect` takes the
//! client out and shuts it down. URIs may carry credentials; they are never
//! logged.
//!
//! # Filter rendering
//! The typed [`RuleFilter`]/[`LoadFilter`] constraints are rendered to
//! partial bson documents here and nowhere else. A constrained slot becomes
//! an equality condition; an unconstrained slot is simply omitted, which in
//! Mongo semantics matches any document.

use futures::TryStreamExt;
use mongodb::bson::{doc, Document, Regex};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use tokio::sync::RwLock;

use super::PolicyStore;
use crate::config::MongoAdapterOptions;
use crate::error::{AdapterError, AdapterResult};
use crate::rule::{CasbinRule, LoadFilter, RuleFilter, MAX_RULE_VALUES};

use async_trait::async_trait;
use tracing::warn;

const DEFAULT_APP_NAME: &str = "casbin-mongo-adapter";
const INDEX_FIELDS: [&str; 7] = ["ptype", "v0", "v1", "v2", "v3", "v4", "v5"];

pub struct MongoPolicyStore {
    client_options: ClientOptions,
    database_name: String,
    collection_name: String,
    client: RwLock<Option<Client>>,
}

impl MongoPolicyStore {
    /// Parses the connection URI and prepares the client options. Fails with
    /// a configuration error on an empty URI and a connection error when the
    /// URI cannot be parsed. No network traffic happens here.
    pub async fn new(options: &MongoAdapterOptions) -> AdapterResult<Self> {
        options.validate()?;
        let mut client_options = ClientOptions::parse(&options.uri)
            .await
            .map_err(|err| AdapterError::Connection(anyhow::Error::new(err)))?;
        client_options.app_name = options
            .app_name
            .clone()
            .or_else(|| Some(DEFAULT_APP_NAME.to_owned()));
        Ok(Self {
            client_options,
            database_name: options.database_name.clone(),
            collection_name: options.collection_name.clone(),
            client: RwLock::new(None),
        })
    }

    async fn database(&self) -> AdapterResult<Database> {
        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or(AdapterError::NotConnected)?;
        Ok(client.database(&self.database_name))
    }

    async fn collection(&self) -> AdapterResult<Collection<CasbinRule>> {
        Ok(self.database().await?.collection(&self.collection_name))
    }
}

#[async_trait]
impl PolicyStore for MongoPolicyStore {
    async fn connect(&self) -> AdapterResult<()> {
        if self.client.read().await.is_some() {
            return Ok(());
        }
        let client = Client::with_options(self.client_options.clone())
            .map_err(|err| AdapterError::Connection(anyhow::Error::new(err)))?;
        // The driver connects lazily; a ping forces the round trip so that
        // open() fails eagerly on an unreachable server.
        client
            .database(&self.database_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|err| AdapterError::Connection(anyhow::Error::new(err)))?;
        *self.client.write().await = Some(client);
        Ok(())
    }

    async fn disconnect(&self) -> AdapterResult<()> {
        let client = self.client.write().await.take();
        if let Some(client) = client {
            client.shutdown().await;
        }
        Ok(())
    }

    async fn find(&self, filter: Option<&LoadFilter>) -> AdapterResult<Vec<CasbinRule>> {
        let collection = self.collection().await?;
        let query = match filter {
            Some(filter) => load_filter_document(filter),
            None => Document::new(),
        };
        let cursor = collection.find(query).await.map_err(storage)?;
        let rules: Vec<CasbinRule> = cursor.try_collect().await.map_err(storage)?;
        Ok(rules)
    }

    async fn insert_one(&self, rule: CasbinRule) -> AdapterResult<()> {
        let collection = self.collection().await?;
        collection.insert_one(rule).await.map_err(storage)?;
        Ok(())
    }

    async fn insert_many(&self, rules: Vec<CasbinRule>) -> AdapterResult<()> {
        if rules.is_empty() {
            return Ok(());
        }
        let collection = self.collection().await?;
        collection.insert_many(rules).await.map_err(storage)?;
        Ok(())
    }

    async fn delete_one(&self, filter: &RuleFilter) -> AdapterResult<u64> {
        let collection = self.collection().await?;
        let result = collection
            .delete_one(rule_filter_document(filter))
            .await
            .map_err(storage)?;
        Ok(result.deleted_count)
    }

    async fn delete_many(&self, filter: &RuleFilter) -> AdapterResult<u64> {
        let collection = self.collection().await?;
        let result = collection
            .delete_many(rule_filter_document(filter))
            .await
            .map_err(storage)?;
        Ok(result.deleted_count)
    }

    async fn ensure_indexes(&self) -> AdapterResult<()> {
        let collection = self.collection().await?;
        for field in INDEX_FIELDS {
            let mut keys = Document::new();
            keys.insert(field, 1);
            let index = IndexModel::builder().keys(keys).build();
            collection.create_index(index).await.map_err(storage)?;
        }
        Ok(())
    }

    async fn clear(&self) -> AdapterResult<()> {
        let database = self.database().await?;
        let names = match database.list_collection_names().await {
            Ok(names) => names,
            Err(err) => {
                warn!(error = %err, collection = %self.collection_name,
                    "listing collections before drop failed");
                return Ok(());
            }
        };
        if !names.iter().any(|name| name == &self.collection_name) {
            return Ok(());
        }
        if let Err(err) = self.collection().await?.drop().await {
            warn!(error = %err, collection = %self.collection_name,
                "dropping policy collection failed");
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "mongodb"
    }
}

fn storage(err: mongodb::error::Error) -> AdapterError {
    AdapterError::Storage(anyhow::Error::new(err))
}

fn rule_filter_document(filter: &RuleFilter) -> Document {
    let mut document = Document::new();
    document.insert("ptype", filter.ptype.as_str());
    for (i, slot) in filter.slots.iter().enumerate() {
        if let Some(value) = slot {
            document.insert(format!("v{i}"), value.as_str());
        }
    }
    document
}

fn load_filter_document(filter: &LoadFilter) -> Document {
    doc! {
        "$or": [
            class_document("p", &filter.p),
            class_document("g", &filter.g),
        ]
    }
}

fn class_document(class: &str, slots: &[Option<String>; MAX_RULE_VALUES]) -> Document {
    let mut document = Document::new();
    document.insert(
        "ptype",
        Regex {
            pattern: format!("^{class}"),
            options: String::new(),
        },
    );
    for (i, slot) in slots.iter().enumerate() {
        if let Some(value) = slot {
            document.insert(format!("v{i}"), value.as_str());
        }
    }
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Bson;

    #[test]
    fn exact_filter_renders_only_present_slots() {
        let filter = RuleFilter::exact("p", &["alice".to_string(), "data1".to_string()]).unwrap();
        let document = rule_filter_document(&filter);
        assert_eq!(document.get_str("ptype").unwrap(), "p");
        assert_eq!(document.get_str("v0").unwrap(), "alice");
        assert_eq!(document.get_str("v1").unwrap(), "data1");
        assert!(!document.contains_key("v2"));
        assert!(!document.contains_key("_id"));
    }

    #[test]
    fn offset_filter_renders_the_window_slots() {
        let filter = RuleFilter::offset("p", 1, &["data2".to_string()]);
        let document = rule_filter_document(&filter);
        assert_eq!(document.get_str("ptype").unwrap(), "p");
        assert!(!document.contains_key("v0"));
        assert_eq!(document.get_str("v1").unwrap(), "data2");
    }

    #[test]
    fn load_filter_renders_per_class_branches() {
        let engine_filter = casbin::Filter {
            p: vec!["alice"],
            g: vec![],
        };
        let document = load_filter_document(&LoadFilter::from(&engine_filter));
        let branches = match document.get("$or") {
            Some(Bson::Array(branches)) => branches,
            other => panic!("expected $or array, got {other:?}"),
        };
        assert_eq!(branches.len(), 2);
        let p_branch = branches[0].as_document().unwrap();
        assert_eq!(p_branch.get_str("v0").unwrap(), "alice");
        assert!(matches!(
            p_branch.get("ptype"),
            Some(Bson::RegularExpression(regex)) if regex.pattern == "^p"
        ));
        let g_branch = branches[1].as_document().unwrap();
        assert!(!g_branch.contains_key("v0"));
    }
}
