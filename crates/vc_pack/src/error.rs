use std::io;
use std::path::PathBuf;

use thiserror::Error;
use vc_pickle::PickleError;

// -----------------------------------------------------------------------------
// ErrorKind

/// Coarse classification of a [`PackError`].
///
/// None of these are transient, retrying the same call fails the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing environment or misuse of the session API.
    Configuration,
    /// An argument of the wrong kind.
    TypeMismatch,
    Io,
    Serialization,
}

// -----------------------------------------------------------------------------
// PackError

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PackError {
    #[error("Workspace root directory `{}` does not exist", .0.display())]
    RootMissing(PathBuf),

    #[error(
        "Module `{0}` was identified as a dependency, but cannot be imported. \
         Ensure that it is installed and available"
    )]
    ModuleNotFound(String),

    #[error("Session `{0}` has already been created. Use `get_active` to access it")]
    SessionExists(String),

    #[error("Session `{0}` has not been created")]
    SessionNotFound(String),

    #[error("Module must be a module or a module name, not `{0}`")]
    TypeMismatch(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parameter store error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Pickle(#[from] PickleError),
}

impl PackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PackError::RootMissing(_)
            | PackError::ModuleNotFound(_)
            | PackError::SessionExists(_)
            | PackError::SessionNotFound(_) => ErrorKind::Configuration,
            PackError::TypeMismatch(_) => ErrorKind::TypeMismatch,
            PackError::Io(_) => ErrorKind::Io,
            PackError::Json(_) | PackError::Pickle(_) => ErrorKind::Serialization,
        }
    }

    #[inline]
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}
