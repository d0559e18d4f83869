//! Error types for data fetching and export.

use thiserror::Error;

/// Errors surfaced by a data source. Query snapshots carry their error by
/// value so every consumer of a snapshot can render it, which is why the
/// variants hold strings instead of source errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("server rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response arrived but could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl FetchError {
    /// A short message suitable for the status line.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::Network(_) => "Could not reach the server. Check your connection.",
            Self::Rejected { .. } => "The server rejected the request.",
            Self::Decode(_) => "The server response could not be read.",
        }
    }

    /// Whether retrying the same request can plausibly succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        match err.status() {
            Some(status) => Self::Rejected {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => Self::Network(err.to_string()),
        }
    }
}

/// Errors raised while building an export artifact.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExportError {
    /// The selected row source produced nothing.
    #[error("nothing to export")]
    NoRows,

    /// I/O error while writing the artifact.
    #[error("I/O error: {0}")]
    Io(String),

    /// The delimited writer refused a record.
    #[error("delimited write error: {0}")]
    Delimited(String),

    /// The workbook archive could not be assembled.
    #[error("workbook write error: {0}")]
    Workbook(String),
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        Self::Delimited(err.to_string())
    }
}

impl From<zip::result::ZipError> for ExportError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Workbook(err.to_string())
    }
}

impl From<quick_xml::Error> for ExportError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Workbook(err.to_string())
    }
}
