//! Error types for template generation
//!
//! Only a main proto source that fails to parse is fatal. Missing imports and
//! unresolvable type references are absorbed by the engine and show up as
//! degraded output instead.

/// Error type for schema resolution and catalog building
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The proto source could not be parsed
    #[error("failed to parse {file}: {message}")]
    Schema {
        /// Name the source was registered under
        file: String,
        /// Parser diagnostic
        message: String,
    },

    /// An import could not be located in the import set
    #[error("import not found: {0}")]
    ImportNotFound(String),
}

impl Error {
    /// Build a schema error from a grammar parser failure
    pub(crate) fn schema(file: &str, err: impl std::fmt::Display) -> Self {
        Error::Schema {
            file: file.to_string(),
            message: err.to_string(),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;
