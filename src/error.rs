use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("connect to policy store failed: {0}")]
    Connection(anyhow::Error),
    #[error("policy store is not connected; call open() first")]
    NotConnected,
    #[error("adapter has been closed; construct a new adapter to reconnect")]
    Closed,
    #[error("load policy failed: {0}")]
    LoadFailed(anyhow::Error),
    #[error("policy type must not be empty")]
    EmptyPolicyType,
    #[error("rule for {ptype:?} carries {count} values; at most 6 are supported")]
    TooManyRuleValues { ptype: String, count: usize },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type AdapterResult<T> = Result<T, AdapterError>;

impl From<AdapterError> for casbin::Error {
    fn from(err: AdapterError) -> Self {
        casbin::error::AdapterError(Box::new(err)).into()
    }
}
