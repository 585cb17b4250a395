use docextract_schema::ValidationError;
use thiserror::Error;

/// Failure to obtain candidate JSON from the extraction model.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("extraction request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("extraction API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("extraction API rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("extraction model returned an empty response")]
    EmptyResponse,

    #[error("extraction model returned malformed JSON: {0}")]
    MalformedJson(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported document: {0}")]
    UnsupportedDocument(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Outcome of extract-then-validate.
///
/// `Gateway` means no candidate data was produced; `Validation` means the
/// model answered but the answer broke the record's contract.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ExtractError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
