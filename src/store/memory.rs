//! In-memory implementation of the policy store.
//!
//! # Purpose
//! Implements [`PolicyStore`] entirely in memory behind a
//! `tokio::sync::RwLock`. It exists for:
//! - local development and tests (no external dependencies)
//! - embedding the adapter where durability is not required
//!
//! # Semantics
//! Not durable: all state is lost on process restart. Filter matching
//! replicates the document store's behavior exactly: constrained slots must
//! equal their value, and unconstrained slots match any document, including
//! documents that carry values in slots the filter says nothing about.

use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;

use super::PolicyStore;
use crate::error::AdapterResult;
use crate::rule::{CasbinRule, LoadFilter, RuleFilter};

#[derive(Default)]
pub struct InMemoryPolicyStore {
    rules: Arc<RwLock<Vec<CasbinRule>>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored documents, for tests and diagnostics.
    pub async fn dump(&self) -> Vec<CasbinRule> {
        self.rules.read().await.clone()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn connect(&self) -> AdapterResult<()> {
        Ok(())
    }

    async fn disconnect(&self) -> AdapterResult<()> {
        Ok(())
    }

    async fn find(&self, filter: Option<&LoadFilter>) -> AdapterResult<Vec<CasbinRule>> {
        let rules = self.rules.read().await;
        Ok(match filter {
            Some(filter) => rules
                .iter()
                .filter(|rule| filter.matches(rule))
                .cloned()
                .collect(),
            None => rules.clone(),
        })
    }

    async fn insert_one(&self, mut rule: CasbinRule) -> AdapterResult<()> {
        rule.id.get_or_insert_with(ObjectId::new);
        self.rules.write().await.push(rule);
        Ok(())
    }

    async fn insert_many(&self, rules: Vec<CasbinRule>) -> AdapterResult<()> {
        let mut stored = self.rules.write().await;
        for mut rule in rules {
            rule.id.get_or_insert_with(ObjectId::new);
            stored.push(rule);
        }
        Ok(())
    }

    async fn delete_one(&self, filter: &RuleFilter) -> AdapterResult<u64> {
        let mut rules = self.rules.write().await;
        match rules.iter().position(|rule| filter.matches(rule)) {
            Some(index) => {
                rules.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, filter: &RuleFilter) -> AdapterResult<u64> {
        let mut rules = self.rules.write().await;
        let before = rules.len();
        rules.retain(|rule| !filter.matches(rule));
        Ok((before - rules.len()) as u64)
    }

    async fn ensure_indexes(&self) -> AdapterResult<()> {
        Ok(())
    }

    async fn clear(&self) -> AdapterResult<()> {
        self.rules.write().await.clear();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(ptype: &str, values: &[&str]) -> CasbinRule {
        let values: Vec<String> = values.iter().map(|value| value.to_string()).collect();
        CasbinRule::from_rule(ptype, &values).unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_an_id() {
        let store = InMemoryPolicyStore::new();
        store
            .insert_one(rule("p", &["alice", "data1", "read"]))
            .await
            .unwrap();
        let stored = store.dump().await;
        assert_eq!(stored.len(), 1);
        assert!(stored[0].id.is_some());
    }

    #[tokio::test]
    async fn delete_one_removes_a_single_duplicate() {
        let store = InMemoryPolicyStore::new();
        store
            .insert_one(rule("p", &["alice", "data1", "read"]))
            .await
            .unwrap();
        store
            .insert_one(rule("p", &["alice", "data1", "read"]))
            .await
            .unwrap();

        let filter = RuleFilter::exact(
            "p",
            &["alice".to_string(), "data1".to_string(), "read".to_string()],
        )
        .unwrap();
        assert_eq!(store.delete_one(&filter).await.unwrap(), 1);
        assert_eq!(store.dump().await.len(), 1);
    }

    #[tokio::test]
    async fn delete_many_counts_every_match() {
        let store = InMemoryPolicyStore::new();
        store
            .insert_many(vec![
                rule("p", &["alice", "data1", "read"]),
                rule("p", &["bob", "data1", "write"]),
                rule("g", &["alice", "admin"]),
            ])
            .await
            .unwrap();

        let filter = RuleFilter::offset("p", 1, &["data1".to_string()]);
        assert_eq!(store.delete_many(&filter).await.unwrap(), 2);
        let remaining = store.dump().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].ptype, "g");
    }

    #[tokio::test]
    async fn clear_empties_the_collection() {
        let store = InMemoryPolicyStore::new();
        store
            .insert_one(rule("g", &["alice", "admin"]))
            .await
            .unwrap();
        store.clear().await.unwrap();
        assert!(store.dump().await.is_empty());
        // Clearing again is still fine.
        store.clear().await.unwrap();
    }
}
