//! Core error types for FamDB

use thiserror::Error;

/// Main error type for FamDB operations
#[derive(Error, Debug)]
pub enum FamDBError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown accession: {0}")]
    UnknownAccession(String),

    #[error("Ambiguous search term '{term}' ({count} results, {exact} exact).\n\
             Please use a more specific name or taxa ID, which can be looked\n\
             up with the 'names' command.")]
    AmbiguousTerm {
        term: String,
        count: usize,
        exact: usize,
    },

    #[error("No species found for search term '{0}'")]
    NoMatchingTaxon(String),

    #[error("Corrupt file: {0}")]
    Corrupt(String),

    #[error("File format version mismatch: file is {found}, this build reads {supported}")]
    FormatMismatch { found: String, supported: String },

    #[error("Inconsistent file set: {0}")]
    InconsistentFileSet(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type alias for FamDB operations
pub type FamDBResult<T> = Result<T, FamDBError>;

impl FamDBError {
    /// Process exit code for this error: 1 for user errors, 2 for data
    /// errors, 3 for I/O failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            FamDBError::InvalidInput(_)
            | FamDBError::UnknownAccession(_)
            | FamDBError::AmbiguousTerm { .. }
            | FamDBError::NoMatchingTaxon(_) => 1,
            FamDBError::Corrupt(_)
            | FamDBError::FormatMismatch { .. }
            | FamDBError::InconsistentFileSet(_)
            | FamDBError::NotFound(_)
            | FamDBError::Serialization(_)
            | FamDBError::Storage(_) => 2,
            FamDBError::Io(_) => 3,
        }
    }

    /// True when the underlying cause is a closed stdout (downstream pager
    /// or pipe went away). The CLI treats this as a clean termination.
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, FamDBError::Io(e) if e.kind() == std::io::ErrorKind::BrokenPipe)
    }
}

impl From<serde_json::Error> for FamDBError {
    fn from(err: serde_json::Error) -> Self {
        FamDBError::Serialization(err.to_string())
    }
}
