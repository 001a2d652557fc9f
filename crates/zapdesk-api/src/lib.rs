// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST client for the Zapdesk backend.
//!
//! Covers the two snapshot endpoints the reconciliation core depends on
//! (`/service` and `/contact`), both paginated, plus the bearer-token
//! handling they share: on a 401/403 the client asks its [`TokenProvider`]
//! for a fresh token and retries the request exactly once.

pub mod client;
pub mod pager;

pub use client::{ApiClient, ServiceQuery, TokenProvider};
pub use pager::Pager;
