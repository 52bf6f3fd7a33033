use alloc::boxed::Box;
use alloc::string::String;

use thiserror::Error;

// -----------------------------------------------------------------------------
// PickleError

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PickleError {
    #[error("No module named `{0}`")]
    Import(String),

    #[error("Module `{module}` has no attribute `{name}`")]
    Attribute { module: String, name: String },

    #[error("No reconstruction function registered under `{0}`")]
    UnknownReducer(String),

    #[error("Reconstruction with `{func}` failed: {reason}")]
    Reduce { func: String, reason: String },

    #[error("Type `{type_path}` takes {expected} values, got {found}")]
    Arity {
        type_path: String,
        expected: usize,
        found: usize,
    },

    #[error("Memo entry {0} is not defined")]
    Memo(u32),

    #[error("Cannot serialize: {0}")]
    Unsupported(String),

    #[error("Stream nests {depth} levels deep, the limit is {limit}")]
    TooDeep { depth: usize, limit: usize },

    #[error("{source} (while saving {trace})")]
    Traced {
        trace: String,
        #[source]
        source: Box<PickleError>,
    },

    #[error("Stream encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PickleError {
    /// Shorthand for [`PickleError::Reduce`].
    #[cold]
    pub fn reduce(func: &str, reason: impl Into<String>) -> Self {
        PickleError::Reduce {
            func: String::from(func),
            reason: reason.into(),
        }
    }

    /// Strips [`PickleError::Traced`] wrappers.
    pub fn root_cause(&self) -> &PickleError {
        match self {
            PickleError::Traced { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
