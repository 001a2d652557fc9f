// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Zapdesk reconciliation core.

use thiserror::Error;

/// The primary error type used across all Zapdesk crates.
///
/// Store mutations never produce errors (the store logs and converges);
/// this type covers the fallible seams: transport, REST calls, config.
#[derive(Debug, Error)]
pub enum ZapdeskError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport errors (socket drop, fetch network failure). Retryable.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The backend answered with a non-success, non-auth status.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Authentication failure (401/403, or a socket rejected for an expired
    /// token). Surfaced distinctly so the caller can refresh the token; the
    /// API client itself retries at most once before returning this.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ZapdeskError {
    /// Wraps a transport-level failure with its source error.
    pub fn transport<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ZapdeskError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True for errors the caller may retry as-is (network-level failures).
    pub fn is_retryable(&self) -> bool {
        matches!(self, ZapdeskError::Transport { .. } | ZapdeskError::Timeout { .. })
    }
}
