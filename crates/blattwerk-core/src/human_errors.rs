// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client-facing error messages.
//
// Every error is reduced to its kind plus a message a person can act on.
// Storage paths, I/O details and raw engine diagnostics stay in the logs.

use crate::error::{BlattwerkError, HandlerErrorKind};
use crate::types::ErrorBody;

/// Convert a `BlattwerkError` into the body returned to a front-end.
pub fn humanize_error(err: &BlattwerkError) -> ErrorBody {
    let message = match err {
        BlattwerkError::NotFound(name) => format!(
            "There is no operation called '{}'.",
            printable(name)
        ),

        // Validation messages are composed by Blattwerk from the request
        // itself, never from storage state.
        BlattwerkError::Validation(detail) => detail.clone(),

        // Only argument errors echo their detail; the others may carry
        // parser output.
        BlattwerkError::Handler { kind, message } => match kind {
            HandlerErrorKind::Corrupt => {
                "The document could not be read. It may be damaged or not a valid file."
                    .to_string()
            }
            HandlerErrorKind::AuthFailed => {
                "The password is incorrect for this document.".to_string()
            }
            HandlerErrorKind::UnsupportedArgument => message.clone(),
            HandlerErrorKind::Unsupported => {
                "This operation cannot be performed on this document.".to_string()
            }
        },

        BlattwerkError::Resource { fatal: true, .. } | BlattwerkError::Io(_) => {
            "The server ran out of temporary storage while processing your files. Please try again."
                .to_string()
        }
        BlattwerkError::Resource { fatal: false, .. } => {
            "The request could not be completed. Please try again.".to_string()
        }
        BlattwerkError::Serialization(_) => {
            "The request could not be processed. Please try again.".to_string()
        }
    };

    ErrorBody {
        kind: err.kind(),
        message,
        retryable: err.is_retryable(),
    }
}

/// Shorten a client-supplied string and drop control characters so it can
/// be echoed back in a message.
pub fn printable(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control())
        .take(64)
        .collect()
}
