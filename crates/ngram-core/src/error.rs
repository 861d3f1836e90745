use std::io;
use std::path::PathBuf;

/// Failure to build a model. No partially loaded model is ever returned.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("{path}: IO error: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}:{line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{path}:{line}: order {found} exceeds the configured order {max}")]
    OrderExceeded {
        path: PathBuf,
        line: usize,
        found: usize,
        max: usize,
    },

    #[error("{path}: unexpected end of input ({expected})")]
    UnexpectedEof { path: PathBuf, expected: String },

    #[error("{path}: expected {expected} models, found {found}")]
    ModelCount {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("n-gram order must be at least 1")]
    ZeroOrder,

    #[error("{path}: no models found")]
    NoModels { path: PathBuf },

    #[error("{path}: expected n-gram order {expected}, found {found}")]
    OrderMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("{path}:{line}: {source}")]
    Trie {
        path: PathBuf,
        line: usize,
        #[source]
        source: TrieError,
    },

    #[error(transparent)]
    Weights(#[from] WeightsError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrieError {
    #[error("path of length {len} exceeds the maximum depth {max}")]
    TooDeep { len: usize, max: usize },
}

/// Invalid interpolation weights.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeightsError {
    #[error("expected {expected} weights, got {got}")]
    CountMismatch { expected: usize, got: usize },

    #[error("weight {index} is negative or not finite: {value}")]
    Invalid { index: usize, value: f64 },

    #[error("no component models")]
    Empty,
}

/// Check that `weights` pairs up with `count` components and that every
/// weight is a finite, non-negative number.
pub fn validate_weights(weights: &[f64], count: usize) -> Result<(), WeightsError> {
    if count == 0 {
        return Err(WeightsError::Empty);
    }
    if weights.len() != count {
        return Err(WeightsError::CountMismatch {
            expected: count,
            got: weights.len(),
        });
    }
    for (index, &value) in weights.iter().enumerate() {
        if !value.is_finite() || value < 0.0 {
            return Err(WeightsError::Invalid { index, value });
        }
    }
    Ok(())
}
