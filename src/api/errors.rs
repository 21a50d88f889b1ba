use thiserror::Error;

/// Failures of the login and listing calls, these end the run
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Authentication rejected: {0}")]
    Rejected(String),
    #[error("Authentication response contains no login url")]
    MissingLoginUrl,
    #[error("Could not extract a session token from {0}")]
    InvalidLoginUrl(String),
}

/// Failure of a single document download
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The service answered with a non success status code
    #[error("HTTP error {status} for document {document_id}")]
    Http { status: u16, document_id: String },
    /// The request never produced a complete response
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
