//! Error type shared by the graph store, the breaker catalog and repair.

use crate::fragment_store::FragmentStoreError;

/// Errors returned by graph construction, breaker parsing and repair.
///
/// Data-quality problems on individual overlap records are not errors;
/// they come back as [`crate::store::AddOutcome`] values and are logged.
#[derive(thiserror::Error, Debug)]
pub enum GraphError {
    #[error("overlap references unknown fragment {iid}")]
    UnknownFragment { iid: u32 },
    #[error("overlap of fragment {iid} with itself")]
    SelfOverlap { iid: u32 },
    #[error("fragment {iid} loaded twice")]
    DuplicateFragment { iid: u32 },
    #[error("unitig stream not ascending: {current} follows {previous}")]
    UnitigStreamNotSorted { previous: u32, current: u32 },
    #[error("unitig cross-reference incomplete: populated {found} of {expected} role slots")]
    IncompleteUnitigCrossReference { expected: usize, found: usize },
    #[error("invalid repair mode {0} (expected 1-4)")]
    InvalidRepairMode(u8),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{source_name}:{line}: {reason}")]
    Parse {
        source_name: String,
        line: usize,
        reason: String,
    },
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("aligner failure: {0}")]
    Aligner(String),
    #[error("fragment store: {0}")]
    FragmentStore(#[from] FragmentStoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = GraphError> = std::result::Result<T, E>;

impl GraphError {
    pub(crate) fn parse(source_name: &str, line: usize, reason: impl Into<String>) -> Self {
        GraphError::Parse {
            source_name: source_name.to_string(),
            line,
            reason: reason.into(),
        }
    }
}
