use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("parse API request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("request superseded by a newer one")]
    Aborted,
    #[error("parse API request failed with status {0}")]
    Status(u16),
    #[error("invalid parse API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FeedApiError {
    /// Intentional cancellation; never shown to the user.
    pub fn is_aborted(&self) -> bool {
        matches!(self, FeedApiError::Aborted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TitleError {
    #[error("feed name must not be empty")]
    EmptyTitle,
    #[error("feed name must be at most {max} characters")]
    TitleTooLong { max: usize },
}

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("invalid URL, expected an http:// or https:// feed address: {0}")]
    InvalidUrl(String),
    #[error("feed is already subscribed: {0}")]
    Duplicate(String),
    #[error("subscription limit reached ({0} feeds)")]
    LimitReached(usize),
    #[error("no subscription with id {0}")]
    NotFound(String),
    #[error(transparent)]
    Title(#[from] TitleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportErrorCode {
    MissingRequiredField,
    InvalidSchema,
    InvalidVersion,
    FileTooLarge,
    InvalidFileType,
    FileReadError,
}

impl ImportErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportErrorCode::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            ImportErrorCode::InvalidSchema => "INVALID_SCHEMA",
            ImportErrorCode::InvalidVersion => "INVALID_VERSION",
            ImportErrorCode::FileTooLarge => "FILE_TOO_LARGE",
            ImportErrorCode::InvalidFileType => "INVALID_FILE_TYPE",
            ImportErrorCode::FileReadError => "FILE_READ_ERROR",
        }
    }

    fn default_message(&self) -> &'static str {
        match self {
            ImportErrorCode::MissingRequiredField => "a required field is missing",
            ImportErrorCode::InvalidSchema => "the data format is invalid",
            ImportErrorCode::InvalidVersion => "unsupported export version",
            ImportErrorCode::FileTooLarge => "file is too large (max 1MB)",
            ImportErrorCode::InvalidFileType => "please choose a JSON file",
            ImportErrorCode::FileReadError => "failed to read the file",
        }
    }
}

impl fmt::Display for ImportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportError {
    pub code: ImportErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ImportError {}

impl ImportError {
    pub fn new(code: ImportErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_owned(),
            details: None,
        }
    }

    pub fn with_details(code: ImportErrorCode, details: impl Into<String>) -> Self {
        Self {
            details: Some(details.into()),
            ..Self::new(code)
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("poller task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
