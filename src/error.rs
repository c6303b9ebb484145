use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Auth(String),

    #[error("Timed out after {timeout:?} waiting for selector: {selector}")]
    Timeout { selector: String, timeout: Duration },
    #[error("The element you are trying to read is missing. Selector: {0}")]
    MissingElement(String),
    #[error("WebDriver command failed: {0}")]
    Browser(#[from] fantoccini::error::CmdError),
    #[error("Couldn't start a WebDriver session: {0}")]
    WebDriverSession(#[from] fantoccini::error::NewSessionError),
    #[error("Pager shows page {found:?}, expected {expected}")]
    PageMismatch { expected: usize, found: Option<usize> },
    #[error("{operation} failed after {attempts} attempts: {source}")]
    Exhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("Not all cases were loaded: declared {declared}, extracted {extracted}")]
    ExtractionCountMismatch { declared: usize, extracted: usize },
    #[error("Causa No Disponible: {0}")]
    CaseUnavailable(String),
    #[error("The detail link has expired")]
    LinkExpired,
    #[error("Couldn't fetch document {url}: {reason}")]
    UploadFetch { url: String, reason: String },

    #[error("{0}")]
    Validation(String),
    #[error("Invalid report date '{0}', expected dd/mm/yyyy")]
    InvalidDate(String),

    #[error("Couldn't parse portal markup: {0}")]
    Parse(String),
    #[error("Store Error: {0}")]
    Store(String),
    #[error("Config Error: {0}")]
    Config(#[from] ::config::ConfigError),
    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),
}

/// Machine-readable failure class reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    AuthError,
    ConnectivityError,
    ExtractionCountMismatch,
    CaseUnavailable,
    LinkExpired,
    UploadFetchError,
    ValidationError,
    InternalError,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Auth(_) => ErrorKind::AuthError,
            Error::Timeout { .. }
            | Error::MissingElement(_)
            | Error::PageMismatch { .. }
            | Error::Browser(_)
            | Error::WebDriverSession(_)
            | Error::Exhausted { .. } => ErrorKind::ConnectivityError,
            Error::ExtractionCountMismatch { .. } => ErrorKind::ExtractionCountMismatch,
            Error::CaseUnavailable(_) => ErrorKind::CaseUnavailable,
            Error::LinkExpired => ErrorKind::LinkExpired,
            Error::UploadFetch { .. } => ErrorKind::UploadFetchError,
            Error::Validation(_) | Error::InvalidDate(_) => ErrorKind::ValidationError,
            Error::Parse(_)
            | Error::Store(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::RuntimeJoin(_) => ErrorKind::InternalError,
        }
    }

    /// Whether a retry envelope may try the failed step again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConnectivityError | ErrorKind::InternalError
        ) && !matches!(
            self,
            Error::Exhausted { .. } | Error::Config(_) | Error::Store(_)
        )
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Terminal error as handed to the enclosing request layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}
