// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge.
//!
//! Converts Figment deserialization errors (bad TOML, unknown fields, type
//! mismatches) and semantic validation errors into miette diagnostics, so
//! the binary can render a single actionable report at startup instead of
//! bailing on the first problem.

use miette::Diagnostic;
use thiserror::Error;

/// A single configuration problem.
///
/// Each variant carries enough context for miette to render an error code
/// and a help line alongside the message.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// An unknown key was found in the configuration.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(zapdesk::config::unknown_key),
        help("valid keys: {valid_keys}")
    )]
    UnknownKey {
        /// The unrecognized key name.
        key: String,
        /// List of valid keys for the section.
        valid_keys: String,
    },

    /// A configuration value has the wrong type.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(
        code(zapdesk::config::invalid_type),
        help("expected {expected}")
    )]
    InvalidType {
        /// The key with the wrong type.
        key: String,
        /// Description of the type mismatch.
        detail: String,
        /// What type was expected.
        expected: String,
    },

    /// A required configuration key is missing.
    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(zapdesk::config::missing_key),
        help("add `{key} = <value>` to your zapdesk.toml")
    )]
    MissingKey {
        /// The missing key name.
        key: String,
    },

    /// The config parsed but a value is semantically invalid.
    #[error("invalid config value: {message}")]
    #[diagnostic(code(zapdesk::config::validation))]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    /// Catch-all for other configuration errors.
    #[error("configuration error: {0}")]
    #[diagnostic(code(zapdesk::config::other))]
    Other(String),
}

/// Convert a `figment::Error` into a list of `ConfigError` diagnostics.
///
/// A figment error may contain multiple problems; each is mapped to the
/// matching variant so unknown keys and type mismatches all surface in one
/// pass.
pub fn figment_to_config_errors(err: figment::Error) -> Vec<ConfigError> {
    use figment::error::Kind;

    let mut errors = Vec::new();

    for error in err {
        let config_error = match &error.kind {
            Kind::UnknownField(field, expected) => ConfigError::UnknownKey {
                key: field.clone(),
                valid_keys: expected.join(", "),
            },
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: field.clone().into_owned(),
            },
            Kind::InvalidType(actual, expected) => {
                let key = error
                    .path
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(".");
                ConfigError::InvalidType {
                    key,
                    detail: format!("found {actual}, expected {expected}"),
                    expected: expected.to_string(),
                }
            }
            _ => ConfigError::Other(format!("{error}")),
        };

        errors.push(config_error);
    }

    errors
}

/// Renders a list of `ConfigError`s through miette's graphical report
/// handler into one block, suitable for printing to stderr before exiting.
pub fn render_errors(errors: &[ConfigError]) -> String {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    let mut out = String::new();
    for error in errors {
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut out, diagnostic).is_err() {
            out.push_str(&format!("Error: {error}\n"));
        }
    }
    out.push_str("fix zapdesk.toml (or the ZAPDESK_* environment) and retry");
    out
}
