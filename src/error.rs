use crate::models::Metric;
use thiserror::Error;

/// Errors raised by the ranking and scoring pipeline.
#[derive(Debug, Error)]
pub enum RankError {
    /// Network, auth, rate-limit or empty-reply failure from an external API
    #[error("Provider error: {0}")]
    Provider(String),

    /// Embedding vectors of different dimensionality were compared
    #[error("Shape mismatch: expected dimension {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Empty seed prompt or empty candidate set
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// The judge reply did not contain every metric needed to score a candidate
    #[error("Judge reply is missing required metrics: {missing:?}")]
    PartialJudgeResult { missing: Vec<Metric> },

    /// Missing input file, missing columns, missing credentials
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RankError {
    /// Row-scoped errors skip the current row; everything else aborts the batch.
    pub fn is_row_scoped(&self) -> bool {
        matches!(
            self,
            RankError::Provider(_) | RankError::PartialJudgeResult { .. }
        )
    }
}

impl From<async_openai::error::OpenAIError> for RankError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        RankError::Provider(err.to_string())
    }
}

pub type RankResult<T> = std::result::Result<T, RankError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_scoped_classification() {
        assert!(RankError::Provider("timeout".to_string()).is_row_scoped());
        assert!(
            RankError::PartialJudgeResult {
                missing: vec![Metric::Diversity]
            }
            .is_row_scoped()
        );
        assert!(!RankError::EmptyInput("no candidates".to_string()).is_row_scoped());
        assert!(
            !RankError::ShapeMismatch {
                expected: 3,
                actual: 4
            }
            .is_row_scoped()
        );
        assert!(!RankError::Configuration("missing file".to_string()).is_row_scoped());
    }

    #[test]
    fn test_error_messages() {
        let err = RankError::ShapeMismatch {
            expected: 384,
            actual: 768,
        };
        assert_eq!(
            err.to_string(),
            "Shape mismatch: expected dimension 384, got 768"
        );

        let err = RankError::PartialJudgeResult {
            missing: vec![Metric::Relevance],
        };
        assert!(err.to_string().contains("Relevance"));
    }
}
