use lapis_store::StoreError;
use lapis_types::{Pid, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LapisError {
    #[error("identifier already exists: {0}")]
    AlreadyExists(Pid),

    #[error("identifier not found: {0}")]
    NotFound(Pid),

    #[error("broken alias: {missing} does not exist (resolved via {})", format_chain(.chain))]
    BrokenAlias { chain: Vec<Pid>, missing: Pid },

    #[error("alias cycle detected: {}", format_chain(.chain))]
    AliasCycle { chain: Vec<Pid> },

    #[error("capacity exceeded: {what} (limit {limit})")]
    CapacityExceeded { what: String, limit: u64 },

    #[error(
        "property name mismatch at index {index} of {pid}: stored {existing:?}, attempted {attempted:?}"
    )]
    PropertyNameMismatch {
        pid: Pid,
        index: u32,
        existing: String,
        attempted: String,
    },

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] TypeError),

    #[error("corrupt record {pid}: {reason}")]
    CorruptRecord { pid: Pid, reason: String },

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: u32, len: u32 },

    #[error("{member} is not a member of {collection}")]
    NotAMember { member: Pid, collection: Pid },

    #[error("invalid segment number: {0}")]
    InvalidSegment(u32),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for LapisError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(pid) => Self::NotFound(pid),
            StoreError::AlreadyExists(pid) => Self::AlreadyExists(pid),
            other => Self::Store(other),
        }
    }
}

impl LapisError {
    pub(crate) fn corrupt(pid: &Pid, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            pid: pid.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn capacity(what: impl Into<String>, limit: u64) -> Self {
        Self::CapacityExceeded {
            what: what.into(),
            limit,
        }
    }
}

fn format_chain(chain: &[Pid]) -> String {
    if chain.is_empty() {
        return "<direct>".to_string();
    }
    chain
        .iter()
        .map(Pid::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type LapisResult<T> = Result<T, LapisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_is_lifted() {
        let pid = Pid::parse("10876/x").unwrap();
        let err: LapisError = StoreError::NotFound(pid.clone()).into();
        assert!(matches!(err, LapisError::NotFound(p) if p == pid));
    }

    #[test]
    fn store_io_is_wrapped() {
        let err: LapisError = StoreError::Unavailable("down".into()).into();
        assert!(matches!(err, LapisError::Store(_)));
    }

    #[test]
    fn chain_is_rendered_in_order() {
        let chain = vec![
            Pid::parse("10876/a2").unwrap(),
            Pid::parse("10876/a1").unwrap(),
        ];
        let err = LapisError::AliasCycle { chain };
        assert_eq!(
            err.to_string(),
            "alias cycle detected: 10876/a2 -> 10876/a1"
        );
    }
}
