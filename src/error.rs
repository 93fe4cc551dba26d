use thiserror::Error;

use crate::auth::AuthError;
use crate::collection::DescribeError;
use crate::download::DownloadError;
use crate::query::ValidationError;

/// Top-level error type returned by the public API.
#[derive(Debug, Error)]
pub enum CdseError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Describe(#[from] DescribeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
