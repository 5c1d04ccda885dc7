/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::types::{Principal, Timestamp};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for permission tree operations
pub type PermissionResult<T> = std::result::Result<T, PermissionError>;

/// Result type for document embedding
pub type DocumentResult<T> = std::result::Result<T, DocumentError>;

/// Permission engine and facade errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum PermissionError {
    #[error("Invalid time: instant 0 is reserved")]
    #[diagnostic(
        code(permissions::invalid_time),
        help("Query with a positive instant. 0 means \"no access\".")
    )]
    InvalidTime,

    #[error("Grant expiration must be non-zero")]
    #[diagnostic(
        code(permissions::zero_expiration),
        help("Use a positive expiration, or MAX_TIMESTAMP for an unlimited grant.")
    )]
    ZeroExpiration,

    #[error("Grant would shorten access from {current} to {requested}")]
    #[diagnostic(
        code(permissions::grant_not_extending),
        help("Grants may only extend an existing expiration. Revoke first to shorten it.")
    )]
    GrantNotExtending {
        current: Timestamp,
        requested: Timestamp,
    },

    #[error("Caller {caller} is not authorized for this operation")]
    #[diagnostic(
        code(permissions::unauthorized),
        help("The caller needs sufficient access at the target path first.")
    )]
    Unauthorized { caller: Principal },

    #[error("Path depth {depth} exceeds maximum {max}")]
    #[diagnostic(code(permissions::path_too_deep))]
    PathTooDeep { depth: usize, max: usize },

    #[error("Path segment of {length} bytes exceeds maximum {max}")]
    #[diagnostic(code(permissions::segment_too_long))]
    SegmentTooLong { length: usize, max: usize },
}

/// Safe sub-document builder errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum DocumentError {
    #[error("Fragment is not a safely embeddable object")]
    #[diagnostic(
        code(document::unsafe_fragment),
        help("The fragment must be a single, balanced {{...}} object.")
    )]
    UnsafeFragment,

    #[error("Path segment {segment:?} cannot be used as an object key")]
    #[diagnostic(
        code(document::unsafe_key),
        help("Segments must not contain '\"' or '\\'.")
    )]
    UnsafeKey { segment: String },

    #[error("Fragment of {size} bytes exceeds maximum {max}")]
    #[diagnostic(code(document::fragment_too_large))]
    FragmentTooLarge { size: usize, max: usize },

    #[error("Fragment is not a JSON object: {reason}")]
    #[diagnostic(code(document::malformed_fragment))]
    MalformedFragment { reason: String },
}

/// Unified crate error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    #[error("Permission error: {0}")]
    #[diagnostic(transparent)]
    Permission(#[from] PermissionError),

    #[error("Document error: {0}")]
    #[diagnostic(transparent)]
    Document(#[from] DocumentError),

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(permtree::configuration_error),
        help("Invalid configuration. Review the PERMTREE_* environment variables.")
    )]
    Config(String),
}

/// Serializable error representation for API responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SerializableError {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl SerializableError {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error_type: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }
}

impl From<&PermissionError> for SerializableError {
    fn from(err: &PermissionError) -> Self {
        let error_type = match err {
            PermissionError::InvalidTime => "invalid_time",
            PermissionError::ZeroExpiration => "zero_expiration",
            PermissionError::GrantNotExtending { .. } => "grant_not_extending",
            PermissionError::Unauthorized { .. } => "unauthorized",
            PermissionError::PathTooDeep { .. } => "path_too_deep",
            PermissionError::SegmentTooLong { .. } => "segment_too_long",
        };
        SerializableError::new(error_type, err.to_string())
    }
}

impl From<&DocumentError> for SerializableError {
    fn from(err: &DocumentError) -> Self {
        let error_type = match err {
            DocumentError::UnsafeFragment => "unsafe_fragment",
            DocumentError::UnsafeKey { .. } => "unsafe_key",
            DocumentError::FragmentTooLarge { .. } => "fragment_too_large",
            DocumentError::MalformedFragment { .. } => "malformed_fragment",
        };
        SerializableError::new(error_type, err.to_string())
    }
}

impl From<Error> for SerializableError {
    fn from(err: Error) -> Self {
        match &err {
            Error::Permission(inner) => inner.into(),
            Error::Document(inner) => inner.into(),
            Error::Config(_) => SerializableError::new("configuration_error", err.to_string()),
        }
    }
}

/// Result type for crate-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Render `error` through the installed miette report handler (code, help)
pub fn render_diagnostic(error: Error) -> String {
    format!("{:?}", miette::Report::new(error))
}
