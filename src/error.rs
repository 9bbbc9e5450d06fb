use thiserror::Error;

/// Failure modes shared by every translation provider
///
/// The `Display` text of each variant is the user-facing description.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("API credentials are not configured")]
    CredentialMissing,

    #[error("API quota has been used up")]
    QuotaExceeded,

    #[error("API response could not be understood: {0}")]
    MalformedResponse(String),

    #[error("No translation found for this word")]
    TermNotFound,

    #[error("Too many requests, please try again later")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

pub type TranslationResult<T> = std::result::Result<T, TranslationError>;
