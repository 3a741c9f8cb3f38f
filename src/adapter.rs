//! The casbin storage adapter.
//!
//! # Purpose
//! Implements [`casbin::Adapter`] on top of a [`PolicyStore`] backend,
//! translating the engine's rule rows into stored documents and back. The
//! adapter owns the connection state machine; the backends only move bytes.
//!
//! # Connection lifecycle
//! `Unopened → Open → Closed`. Every storage operation requires `Open`;
//! `close` is idempotent and terminal. A closed adapter cannot be reopened;
//! construct a new one instead.
//!
//! # Caveats
//! `save_policy` clears the collection and bulk-inserts in two separate,
//! non-transactional operations. A concurrent reader can observe a transient
//! empty state, and a mid-save failure can leave the collection empty.

use std::sync::Arc;

use async_trait::async_trait;
use casbin::{Adapter, Filter, Model};
use tracing::{debug, error, warn};

use crate::config::MongoAdapterOptions;
use crate::error::{AdapterError, AdapterResult};
use crate::rule::{CasbinRule, LoadFilter, RuleFilter};
use crate::store::mongo::MongoPolicyStore;
use crate::store::PolicyStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Unopened,
    Open,
    Closed,
}

pub struct MongoAdapter {
    store: Arc<dyn PolicyStore>,
    state: ConnectionState,
    filtered: bool,
    is_filtered: bool,
}

impl MongoAdapter {
    /// Builds an adapter over MongoDB without connecting. An empty URI fails
    /// with a configuration error, an unparseable one with a connection
    /// error; no partial adapter is returned.
    pub async fn new(options: MongoAdapterOptions) -> AdapterResult<Self> {
        let filtered = options.filtered;
        let store = MongoPolicyStore::new(&options).await?;
        Ok(Self::with_store(Arc::new(store), filtered))
    }

    /// Builds and opens an adapter in one call.
    pub async fn connect(options: MongoAdapterOptions) -> AdapterResult<Self> {
        let mut adapter = Self::new(options).await?;
        adapter.open().await?;
        Ok(adapter)
    }

    /// Wires an arbitrary backend. This is the seam the in-memory store and
    /// the tests use.
    pub fn with_store(store: Arc<dyn PolicyStore>, filtered: bool) -> Self {
        Self {
            store,
            state: ConnectionState::Unopened,
            filtered,
            is_filtered: filtered,
        }
    }

    /// Establishes the connection and provisions the lookup indexes. Index
    /// provisioning failure is logged and never blocks opening.
    pub async fn open(&mut self) -> AdapterResult<()> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Closed => Err(AdapterError::Closed),
            ConnectionState::Unopened => {
                self.store.connect().await?;
                if let Err(err) = self.store.ensure_indexes().await {
                    warn!(error = %err, backend = self.store.backend_name(),
                        "creating policy indexes failed");
                }
                self.state = ConnectionState::Open;
                debug!(backend = self.store.backend_name(), "policy store opened");
                Ok(())
            }
        }
    }

    /// Releases the connection if one is open. Idempotent; closing an
    /// adapter that was never opened is a no-op, but still seals it.
    pub async fn close(&mut self) -> AdapterResult<()> {
        let was_open = self.state == ConnectionState::Open;
        self.state = ConnectionState::Closed;
        if was_open {
            self.store.disconnect().await?;
        }
        Ok(())
    }

    /// Whether this adapter was configured to honor load filters.
    pub fn supports_filtered(&self) -> bool {
        self.filtered
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    fn require_open(&self) -> AdapterResult<()> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Unopened | ConnectionState::Closed => {
                Err(AdapterError::NotConnected)
            }
        }
    }

    async fn load_rules(
        &mut self,
        m: &mut dyn Model,
        filter: Option<LoadFilter>,
    ) -> AdapterResult<()> {
        self.require_open()?;
        let rules = match self.store.find(filter.as_ref()).await {
            Ok(rules) => rules,
            Err(err) => {
                error!(error = %err, backend = self.store.backend_name(),
                    "loading policy rules failed");
                return Err(AdapterError::LoadFailed(anyhow::Error::new(err)));
            }
        };
        let count = rules.len();
        for rule in &rules {
            load_into_model(rule, m);
        }
        debug!(rules = count, filtered = filter.is_some(), "policy rules loaded");
        self.is_filtered = filter.is_some();
        Ok(())
    }
}

/// Feeds one stored rule to the engine through its standard loader. The
/// section is the first character of `ptype`; rows with an empty `ptype` or
/// a section the model does not define are skipped.
fn load_into_model(rule: &CasbinRule, m: &mut dyn Model) {
    let Some(section) = rule.ptype.chars().next() else {
        return;
    };
    m.add_policy(&section.to_string(), &rule.ptype, rule.rule_values());
}

fn new_record(ptype: &str, rule: &[String]) -> AdapterResult<CasbinRule> {
    Ok(CasbinRule::from_rule(ptype, rule)?.stamped())
}

#[async_trait]
impl Adapter for MongoAdapter {
    async fn load_policy(&mut self, m: &mut dyn Model) -> casbin::Result<()> {
        self.load_rules(m, None).await?;
        Ok(())
    }

    async fn load_filtered_policy<'a>(
        &mut self,
        m: &mut dyn Model,
        f: Filter<'a>,
    ) -> casbin::Result<()> {
        let filter = if self.filtered {
            let filter = LoadFilter::from(&f);
            filter.is_constrained().then_some(filter)
        } else {
            None
        };
        self.load_rules(m, filter).await?;
        Ok(())
    }

    async fn save_policy(&mut self, m: &mut dyn Model) -> casbin::Result<()> {
        self.require_open()?;
        // Encode the whole model first so an unencodable rule aborts before
        // the collection is touched. "p" rules precede "g" rules; within a
        // section the model's own order is kept.
        let mut lines = Vec::new();
        for section in ["p", "g"] {
            if let Some(assertions) = m.get_model().get(section) {
                for (ptype, assertion) in assertions {
                    for rule in assertion.get_policy() {
                        lines.push(new_record(ptype, rule)?);
                    }
                }
            }
        }
        self.store.clear().await?;
        if !lines.is_empty() {
            self.store.insert_many(lines).await?;
        }
        Ok(())
    }

    async fn clear_policy(&mut self) -> casbin::Result<()> {
        self.require_open()?;
        self.store.clear().await?;
        Ok(())
    }

    fn is_filtered(&self) -> bool {
        self.is_filtered
    }

    async fn add_policy(
        &mut self,
        _sec: &str,
        ptype: &str,
        rule: Vec<String>,
    ) -> casbin::Result<bool> {
        self.require_open()?;
        let line = new_record(ptype, &rule)?;
        self.store.insert_one(line).await?;
        Ok(true)
    }

    async fn add_policies(
        &mut self,
        _sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> casbin::Result<bool> {
        self.require_open()?;
        let lines = rules
            .iter()
            .map(|rule| new_record(ptype, rule))
            .collect::<AdapterResult<Vec<_>>>()?;
        if !lines.is_empty() {
            self.store.insert_many(lines).await?;
        }
        Ok(true)
    }

    async fn remove_policy(
        &mut self,
        _sec: &str,
        ptype: &str,
        rule: Vec<String>,
    ) -> casbin::Result<bool> {
        self.require_open()?;
        let filter = RuleFilter::exact(ptype, &rule)?;
        Ok(self.store.delete_one(&filter).await? > 0)
    }

    async fn remove_policies(
        &mut self,
        _sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> casbin::Result<bool> {
        self.require_open()?;
        // Sequential delete-one per rule; there is no transaction here, in
        // line with the adapter's overall non-atomic posture.
        let mut all_removed = true;
        for rule in &rules {
            let filter = RuleFilter::exact(ptype, rule)?;
            all_removed &= self.store.delete_one(&filter).await? > 0;
        }
        Ok(all_removed)
    }

    async fn remove_filtered_policy(
        &mut self,
        _sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: Vec<String>,
    ) -> casbin::Result<bool> {
        self.require_open()?;
        let filter = RuleFilter::offset(ptype, field_index, &field_values);
        Ok(self.store.delete_many(&filter).await? > 0)
    }
}
