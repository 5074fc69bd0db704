use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure taxonomy for the acquisition pipeline.
///
/// Deliberate non-error outcomes (a member with no mesh, a duplicate node
/// name, an unavailable scene sink) are not variants here; they are carried
/// by `FetchOutcome` and `ImportOutcome` instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("another acquisition is already in flight")]
    Busy,

    #[error("client id or client secret is missing")]
    CredentialsMissing,

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("empty or null response from catalog")]
    EmptyResponse,

    #[error("catalog error ({status}): {message}")]
    Catalog { message: String, status: u16 },

    #[error("failed to decode catalog payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("import failed: {0}")]
    Import(String),
}
