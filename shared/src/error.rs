use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Authentication,
    Authorization,
    Validation,
    NotFound,
    Conflict,
    RateLimited,
    Deserialization,
    Configuration,
    InvalidState,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::Conflict | Self::RateLimited => {
                ErrorSeverity::Transient
            }

            Self::Deserialization | Self::Internal | Self::InvalidState => ErrorSeverity::Fatal,

            Self::Authentication
            | Self::Authorization
            | Self::Validation
            | Self::NotFound
            | Self::Configuration
            | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimited | Self::Conflict
        )
    }

    #[must_use]
    pub const fn from_http_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::Validation,
            401 => Self::Authentication,
            403 => Self::Authorization,
            404 => Self::NotFound,
            408 => Self::Timeout,
            409 => Self::Conflict,
            429 => Self::RateLimited,
            500..=599 => Self::Internal,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Authentication => "Your session has expired. Please sign in again.".into(),
            ErrorKind::Authorization => {
                "You don't have permission to perform this action.".into()
            }
            ErrorKind::Validation | ErrorKind::Configuration => self.message.clone(),
            ErrorKind::NotFound => "The requested item could not be found.".into(),
            ErrorKind::Conflict => {
                "This action conflicts with a recent change. Please refresh and try again.".into()
            }
            ErrorKind::RateLimited => "Too many requests. Please wait a moment and try again.".into(),
            ErrorKind::Deserialization => {
                "The server sent a response we couldn't read. Please try again later.".into()
            }
            ErrorKind::InvalidState => self.message.clone(),
            ErrorKind::Internal | ErrorKind::Unknown => {
                "An unexpected error occurred. Please try again or contact support.".into()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

/// Failure observed while talking to the backend.
///
/// Carried inside events, so it stays cloneable and serializable rather than
/// wrapping the transport's own error type.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server responded with status {status}")]
    Status { status: u16 },
    #[error("malformed response body: {0}")]
    Body(String),
    #[error("no backend session is configured")]
    NotConfigured,
}

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        match &e {
            ApiError::Transport(reason) => {
                AppError::new(ErrorKind::Network, "Network request failed").with_internal(reason)
            }
            ApiError::Status { status } => {
                AppError::new(ErrorKind::from_http_status(*status), e.to_string())
                    .with_context("http_status", status.to_string())
            }
            ApiError::Body(reason) => {
                AppError::new(ErrorKind::Deserialization, "Unexpected response from server")
                    .with_internal(reason)
            }
            ApiError::NotConfigured => {
                AppError::new(ErrorKind::Authentication, "Not signed in")
            }
        }
    }
}

/// Caller misuse of the coordinator. These are rejected up front rather than
/// allowed to corrupt the pending set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("a delete batch needs at least one item")]
    EmptyBatch,
    #[error("items already pending deletion: {}", .0.join(", "))]
    AlreadyPending(Vec<String>),
    #[error("items not present in the list: {}", .0.join(", "))]
    UnknownItems(Vec<String>),
}

impl From<CoordinatorError> for AppError {
    fn from(e: CoordinatorError) -> Self {
        match e {
            CoordinatorError::EmptyBatch => {
                AppError::new(ErrorKind::Validation, "Select at least one recipe to delete")
            }
            CoordinatorError::AlreadyPending(_) => {
                AppError::new(ErrorKind::Conflict, "That recipe is already being deleted")
                    .with_internal(e.to_string())
                    .with_severity(ErrorSeverity::Permanent)
            }
            CoordinatorError::UnknownItems(_) => {
                AppError::new(ErrorKind::InvalidState, "That recipe is no longer in your list")
                    .with_internal(e.to_string())
                    .with_severity(ErrorSeverity::Permanent)
            }
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("invalid base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Configuration, e.to_string())
    }
}
