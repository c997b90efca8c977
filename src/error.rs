//! Error types for clustering, ranking and checkpointing.

use thiserror::Error;

/// Errors raised by the clustering engine and the result assembler.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Empty input: no vectors to cluster")]
    EmptyInput,

    #[error("Dimension mismatch at record {index} ({id}): expected {expected}, found {found}")]
    DimensionMismatch {
        index: usize,
        id: String,
        expected: usize,
        found: usize,
    },

    #[error("Record {index} ({id}) has an empty vector")]
    EmptyVector { index: usize, id: String },

    #[error("Non-finite value in vector of record {index} ({id})")]
    NonFiniteValue { index: usize, id: String },

    #[error("Record {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("Cannot create {requested} clusters from {n_items} items")]
    InvalidClusterCount { requested: usize, n_items: usize },

    #[error("Invalid k range: min_k {min_k} is greater than max_k {max_k}")]
    InvalidRange { min_k: usize, max_k: usize },

    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },

    #[error("Cosine similarity undefined: {subject} has zero norm")]
    DegenerateVector { subject: String },

    #[error("Checkpoint does not match input: {0}")]
    CheckpointMismatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClusterError {
    /// True for malformed input or invalid clustering parameters, which abort the run.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput
                | Self::DimensionMismatch { .. }
                | Self::EmptyVector { .. }
                | Self::NonFiniteValue { .. }
                | Self::MissingField { .. }
                | Self::InvalidClusterCount { .. }
                | Self::InvalidRange { .. }
                | Self::InvalidParameter { .. }
        )
    }
}

pub type Result<T, E = ClusterError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_error_classification() {
        assert!(ClusterError::EmptyInput.is_input_error());
        assert!(ClusterError::InvalidRange { min_k: 5, max_k: 2 }.is_input_error());
        assert!(ClusterError::EmptyVector {
            index: 0,
            id: "a".to_string()
        }
        .is_input_error());
        assert!(!ClusterError::CheckpointMismatch("k".to_string()).is_input_error());
        assert!(!ClusterError::DegenerateVector {
            subject: "centroid".to_string()
        }
        .is_input_error());
    }

    #[test]
    fn test_messages_name_the_record() {
        let err = ClusterError::DimensionMismatch {
            index: 7,
            id: "abc".to_string(),
            expected: 3,
            found: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("record 7"));
        assert!(msg.contains("abc"));
    }
}
