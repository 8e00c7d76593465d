//! Error types for the note publishing workflow.
//!
//! Errors are layered the same way the workflow is:
//!
//! - [`AuthError`] - browser-driven login failures
//! - [`RequestError`] - outcomes of a single retried HTTP call
//! - [`PublishError`] - what callers of [`crate::NotePublisher`] see
//!
//! Lower-level errors never reach the caller raw; the publisher wraps them in
//! the [`PublishError`] variant for the stage that failed and keeps the
//! original error as its source.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T, E = PublishError> = std::result::Result<T, E>;

/// Failures while obtaining a session through the login page.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The success condition did not become true within the configured timeout.
    #[error("login timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The login page reported an error (wrong email or password).
    #[error("login rejected: {reason}")]
    InvalidCredentials { reason: String },

    /// The browser could not be launched or driven.
    #[error("browser error: {message}")]
    Browser { message: String },

    /// Login appeared to succeed but the browser context holds no cookies.
    #[error("login finished without any session cookies")]
    NoCookies,
}

impl AuthError {
    /// Creates a browser error from any displayable message.
    pub fn browser(message: impl Into<String>) -> Self {
        Self::Browser {
            message: message.into(),
        }
    }
}

/// Failures of one logical HTTP call made through [`crate::http::RetryClient`].
#[derive(Debug, Error)]
pub enum RequestError {
    /// Every permitted attempt failed with a retryable outcome.
    #[error("request failed after {attempts} attempts (last status: {})", describe_status(.last_status))]
    Exhausted {
        attempts: u32,
        /// HTTP status of the last attempt, `None` when it failed at the transport level.
        last_status: Option<u16>,
    },

    /// The server answered with a non-retryable client error.
    #[error("request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The request could not be sent at all.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The server answered 2xx but the body did not have the expected shape.
    #[error("unexpected response body: {message}")]
    Decode { message: String },
}

impl RequestError {
    /// HTTP status associated with the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Exhausted { last_status, .. } => *last_status,
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport { .. } | Self::Decode { .. } => None,
        }
    }
}

fn describe_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |status| status.to_string())
}

/// Errors returned by [`crate::NotePublisher`].
#[derive(Debug, Error)]
pub enum PublishError {
    /// Caller input was rejected before any browser or network activity.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("authentication failed: {0}")]
    AuthFailed(#[source] AuthError),

    #[error("image upload failed: {0}")]
    UploadFailed(#[source] RequestError),

    #[error("draft creation failed: {0}")]
    CreateFailed(#[source] RequestError),

    #[error("draft update failed: {0}")]
    UpdateFailed(#[source] RequestError),

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl PublishError {
    /// Creates an invalid input error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Name of the workflow stage that produced this error, for log context.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "validate",
            Self::AuthFailed(_) => "authenticate",
            Self::UploadFailed(_) => "upload",
            Self::CreateFailed(_) => "create",
            Self::UpdateFailed(_) => "update",
            Self::Config { .. } => "config",
        }
    }
}
