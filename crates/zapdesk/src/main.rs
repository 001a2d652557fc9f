// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Zapdesk - realtime service desk reconciliation client.
//!
//! Binary entry point: loads and validates configuration, sets up
//! structured logging, and dispatches to the subcommands.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod tail;

/// Zapdesk - realtime service desk reconciliation client.
#[derive(Parser, Debug)]
#[command(name = "zapdesk", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect and follow the live service overview.
    Tail {
        /// Follow a single contact's chat instead of the overview.
        #[arg(long)]
        contact: Option<String>,
    },
    /// Print the resolved configuration and exit.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match zapdesk_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            eprintln!("{}", zapdesk_config::render_errors(&errors));
            std::process::exit(1);
        }
    };

    init_tracing(&config.session.log_level);

    let result = match cli.command {
        Some(Commands::Tail { contact }) => tail::run(config, contact).await,
        Some(Commands::Config) => match render_config(&config) {
            Ok(rendered) => {
                println!("{rendered}");
                Ok(())
            }
            Err(e) => Err(e),
        },
        None => {
            println!("zapdesk: use --help for available commands");
            Ok(())
        }
    };

    if let Err(error) = result {
        tracing::error!(%error, "command failed");
        std::process::exit(1);
    }
}

/// Renders the resolved configuration as TOML with the API token masked.
/// Credentials never reach stdout in clear, same treatment the socket
/// gives URLs in its logs.
fn render_config(
    config: &zapdesk_config::ZapdeskConfig,
) -> Result<String, zapdesk_core::error::ZapdeskError> {
    let mut masked = config.clone();
    if let Some(token) = &mut masked.api.token
        && !token.is_empty()
    {
        *token = "[redacted]".into();
    }
    toml::to_string_pretty(&masked).map_err(|e| {
        zapdesk_core::error::ZapdeskError::Internal(format!("failed to render config: {e}"))
    })
}

/// Initializes the tracing subscriber; `RUST_LOG` overrides the
/// config-supplied level.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("zapdesk={log_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_config_masks_the_api_token() {
        let mut config = zapdesk_config::ZapdeskConfig::default();
        config.api.token = Some("secret123".into());

        let rendered = render_config(&config).unwrap();
        assert!(!rendered.contains("secret123"), "{rendered}");
        assert!(rendered.contains("[redacted]"));
    }

    #[test]
    fn rendered_config_leaves_an_absent_token_absent() {
        let config = zapdesk_config::ZapdeskConfig::default();
        let rendered = render_config(&config).unwrap();
        assert!(!rendered.contains("redacted"));
    }
}
