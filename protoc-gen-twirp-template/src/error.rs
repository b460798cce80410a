//! Error types for the plugin

/// Error type for template generation inside protoc
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// The request from protoc could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A `--twirp-template_opt` parameter was not understood
    #[error("invalid parameter: {0}")]
    Parameter(String),

    /// A file to generate has no descriptor in the request
    #[error("file descriptor not found: {0}")]
    MissingFile(String),

    /// A catalog could not be serialized
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
