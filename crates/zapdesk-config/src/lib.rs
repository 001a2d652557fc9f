// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for Zapdesk.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), XDG file hierarchy lookup, and environment
//! variable overrides.
//!
//! # Usage
//!
//! ```no_run
//! use zapdesk_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("acting as {}", config.session.local_user);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{figment_to_config_errors, render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::ZapdeskConfig;

/// Load configuration from the XDG hierarchy and validate it.
///
/// The high-level entry point: loads config from TOML files + env vars via
/// Figment, then runs post-deserialization validation. Returns either a
/// valid [`ZapdeskConfig`] or every problem found, for rendering with
/// [`render_errors`].
pub fn load_and_validate() -> Result<ZapdeskConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(figment_to_config_errors(err)),
    }
}

/// Validate a TOML string as a full configuration. Test-friendly variant
/// of [`load_and_validate`].
pub fn load_and_validate_str(toml_content: &str) -> Result<ZapdeskConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(figment_to_config_errors(err)),
    }
}
