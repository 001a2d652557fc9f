// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup instead of silently ignoring typos.

use serde::{Deserialize, Serialize};

/// Top-level Zapdesk configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values; only `api.token` and `session.local_user` genuinely need to be
/// supplied.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ZapdeskConfig {
    /// REST backend settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Websocket transport settings.
    #[serde(default)]
    pub socket: SocketConfig,

    /// Local session behavior.
    #[serde(default)]
    pub session: SessionConfig,
}

/// REST backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL of the backend REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Initial bearer token. Refreshed automatically when rejected.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

/// Websocket transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SocketConfig {
    /// Base `ws://` or `wss://` URL; channel paths and the auth token are
    /// appended per socket.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Fixed wait before redialing after a disconnect, in milliseconds.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Whether a server-initiated clean close is also redialed.
    #[serde(default = "default_true")]
    pub reconnect_on_clean_close: bool,

    /// Capacity of the per-socket frame channel.
    #[serde(default = "default_frame_buffer")]
    pub frame_buffer: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            reconnect_on_clean_close: default_true(),
            frame_buffer: default_frame_buffer(),
        }
    }
}

fn default_ws_url() -> String {
    "ws://localhost:8000".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

fn default_frame_buffer() -> usize {
    256
}

/// Local session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Label of the local agent, matched against the `user` field of
    /// lifecycle events to tell own actions from another agent's.
    #[serde(default)]
    pub local_user: String,

    /// Page size for snapshot fetches.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Interval between periodic snapshot refreshes, in seconds.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            local_user: String::new(),
            page_size: default_page_size(),
            refresh_interval_secs: default_refresh_interval_secs(),
            log_level: default_log_level(),
        }
    }
}

fn default_page_size() -> u32 {
    20
}

fn default_refresh_interval_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}
