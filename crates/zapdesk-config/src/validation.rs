// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as URL schemes and non-zero sizes.

use url::Url;

use crate::diagnostic::ConfigError;
use crate::model::ZapdeskConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or all collected validation
/// errors at once (does not fail fast).
pub fn validate_config(config: &ZapdeskConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.api.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ConfigError::Validation {
            message: format!(
                "api.base_url must use http or https, got `{}`",
                url.scheme()
            ),
        }),
        Err(e) => errors.push(ConfigError::Validation {
            message: format!("api.base_url `{}` is not a valid URL: {e}", config.api.base_url),
        }),
    }

    match Url::parse(&config.socket.ws_url) {
        Ok(url) if matches!(url.scheme(), "ws" | "wss") => {}
        Ok(url) => errors.push(ConfigError::Validation {
            message: format!("socket.ws_url must use ws or wss, got `{}`", url.scheme()),
        }),
        Err(e) => errors.push(ConfigError::Validation {
            message: format!("socket.ws_url `{}` is not a valid URL: {e}", config.socket.ws_url),
        }),
    }

    if config.socket.reconnect_delay_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "socket.reconnect_delay_ms must be greater than 0".to_string(),
        });
    }

    if config.socket.frame_buffer == 0 {
        errors.push(ConfigError::Validation {
            message: "socket.frame_buffer must be greater than 0".to_string(),
        });
    }

    if config.session.local_user.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "session.local_user must not be empty".to_string(),
        });
    }

    if config.session.page_size == 0 {
        errors.push(ConfigError::Validation {
            message: "session.page_size must be at least 1".to_string(),
        });
    }

    const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
    if !LOG_LEVELS.contains(&config.session.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "session.log_level must be one of {LOG_LEVELS:?}, got `{}`",
                config.session.log_level
            ),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
