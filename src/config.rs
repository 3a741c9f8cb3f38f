// Adapter construction options with casbin-conventional defaults.
use crate::error::{AdapterError, AdapterResult};

pub const DEFAULT_DATABASE_NAME: &str = "casbindb";
pub const DEFAULT_COLLECTION_NAME: &str = "casbin";

/// Construction-time configuration for [`crate::MongoAdapter`].
///
/// Only `uri` is required; everything else carries the conventional casbin
/// defaults. Driver-level knobs (TLS, auth, pool sizing, timeouts) are
/// expressed in the connection URI itself and passed through untouched.
#[derive(Debug, Clone)]
pub struct MongoAdapterOptions {
    pub uri: String,
    pub database_name: String,
    pub collection_name: String,
    /// Gates whether `load_filtered_policy` applies its filter argument.
    pub filtered: bool,
    /// Application name reported to the server; defaults to the crate name.
    pub app_name: Option<String>,
}

impl MongoAdapterOptions {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database_name: DEFAULT_DATABASE_NAME.to_owned(),
            collection_name: DEFAULT_COLLECTION_NAME.to_owned(),
            filtered: false,
            app_name: None,
        }
    }

    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.collection_name = name.into();
        self
    }

    pub fn filtered(mut self, filtered: bool) -> Self {
        self.filtered = filtered;
        self
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub(crate) fn validate(&self) -> AdapterResult<()> {
        if self.uri.trim().is_empty() {
            return Err(AdapterError::Configuration(
                "mongo connection URI must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_casbin_conventions() {
        let options = MongoAdapterOptions::new("mongodb://localhost:27017");
        assert_eq!(options.database_name, "casbindb");
        assert_eq!(options.collection_name, "casbin");
        assert!(!options.filtered);
        assert!(options.app_name.is_none());
    }

    #[test]
    fn empty_uri_is_rejected() {
        let options = MongoAdapterOptions::new("  ");
        assert!(matches!(
            options.validate(),
            Err(AdapterError::Configuration(_))
        ));
    }

    #[test]
    fn builder_overrides_apply() {
        let options = MongoAdapterOptions::new("mongodb://localhost:27017")
            .database_name("authz")
            .collection_name("rules")
            .filtered(true)
            .app_name("gateway");
        assert_eq!(options.database_name, "authz");
        assert_eq!(options.collection_name, "rules");
        assert!(options.filtered);
        assert_eq!(options.app_name.as_deref(), Some("gateway"));
    }
}
