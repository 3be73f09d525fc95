// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Blattwerk.
//
// Every failure a caller can observe falls into one closed `ErrorKind`, so
// front-ends branch on the kind and never on message text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sub-kind of a failure reported by the document engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandlerErrorKind {
    /// Malformed or unreadable input document.
    Corrupt,
    /// Wrong password for an encrypted document.
    AuthFailed,
    /// A parameter value the engine cannot honour (e.g. a 45 degree rotation).
    UnsupportedArgument,
    /// A feature the engine cannot perform on this input.
    Unsupported,
}

impl std::fmt::Display for HandlerErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Corrupt => "corrupt document",
            Self::AuthFailed => "authentication failed",
            Self::UnsupportedArgument => "unsupported argument",
            Self::Unsupported => "unsupported",
        };
        f.write_str(label)
    }
}

/// Top-level error type for all Blattwerk operations.
#[derive(Debug, Error)]
pub enum BlattwerkError {
    // -- Request errors --
    #[error("unknown operation: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),

    // -- Document engine errors --
    #[error("{kind}: {message}")]
    Handler {
        kind: HandlerErrorKind,
        message: String,
    },

    // -- Ephemeral storage --
    #[error("resource error: {message}")]
    Resource { fatal: bool, message: String },

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BlattwerkError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::handler(HandlerErrorKind::Corrupt, message)
    }

    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::handler(HandlerErrorKind::AuthFailed, message)
    }

    pub fn unsupported_argument(message: impl Into<String>) -> Self {
        Self::handler(HandlerErrorKind::UnsupportedArgument, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::handler(HandlerErrorKind::Unsupported, message)
    }

    pub fn handler(kind: HandlerErrorKind, message: impl Into<String>) -> Self {
        Self::Handler {
            kind,
            message: message.into(),
        }
    }

    /// A resource failure that aborts the request (allocation, packaging).
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Resource {
            fatal: true,
            message: message.into(),
        }
    }

    /// A resource failure that is recorded but does not abort anything
    /// (e.g. one artifact could not be released).
    pub fn non_fatal(message: impl Into<String>) -> Self {
        Self::Resource {
            fatal: false,
            message: message.into(),
        }
    }

    /// The closed kind surfaced to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Handler { kind, .. } => match kind {
                HandlerErrorKind::Corrupt => ErrorKind::Corrupt,
                HandlerErrorKind::AuthFailed => ErrorKind::AuthFailed,
                HandlerErrorKind::UnsupportedArgument => ErrorKind::UnsupportedArgument,
                HandlerErrorKind::Unsupported => ErrorKind::Unsupported,
            },
            Self::Resource { .. } | Self::Io(_) | Self::Serialization(_) => ErrorKind::Resource,
        }
    }

    /// Whether the same request may succeed if simply retried.
    ///
    /// Only resource errors qualify: validation and engine failures need a
    /// different input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Resource { .. } | Self::Io(_))
    }
}

/// Closed error-kind enumeration carried in every error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Corrupt,
    AuthFailed,
    UnsupportedArgument,
    Unsupported,
    Resource,
}

impl ErrorKind {
    /// Stable machine-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not-found",
            Self::Validation => "validation",
            Self::Corrupt => "corrupt",
            Self::AuthFailed => "auth-failed",
            Self::UnsupportedArgument => "unsupported-argument",
            Self::Unsupported => "unsupported",
            Self::Resource => "resource",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BlattwerkError>;
